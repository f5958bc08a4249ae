use super::scene::{NodeId, SceneWorld};
use super::ui::{Display, ElementId, UiLayer};

pub fn show_flex(ui: &mut UiLayer, elements: &[Option<ElementId>]) {
    set_display(ui, elements, Display::Flex);
}

pub fn show_block(ui: &mut UiLayer, elements: &[Option<ElementId>]) {
    set_display(ui, elements, Display::Block);
}

pub fn hide_ui(ui: &mut UiLayer, elements: &[Option<ElementId>]) {
    set_display(ui, elements, Display::None);
}

pub fn show_entity(world: &mut SceneWorld, nodes: &[Option<NodeId>]) {
    set_visible(world, nodes, true);
}

pub fn hide_entity(world: &mut SceneWorld, nodes: &[Option<NodeId>]) {
    set_visible(world, nodes, false);
}

fn set_display(ui: &mut UiLayer, elements: &[Option<ElementId>], display: Display) {
    for id in elements.iter().flatten() {
        ui.set_display(*id, display);
    }
}

fn set_visible(world: &mut SceneWorld, nodes: &[Option<NodeId>], visible: bool) {
    for id in nodes.iter().flatten() {
        world.set_visible(*id, visible);
    }
}

use engine::{ElementId, ElementKind, NodeId, UiLayer};

/// Walkthrough stages in the only order they may be entered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub(crate) enum Stage {
    Start,
    Tripping,
    Question,
    ClearPath1,
    WalkingSafe,
    Overlay2,
    Slipping,
    ClearPath2,
    Slipping2,
    Note,
    AddSign,
    SafeSign,
    Exit,
}

/// The single tap a waiting sequencer will accept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum Gate {
    StartOverlay,
    Question,
    ClearPath1,
    Overlay2,
    ClearPath2,
    AddSign,
}

impl Gate {
    pub(crate) fn target(self) -> UiTarget {
        match self {
            Gate::StartOverlay => UiTarget::Overlay,
            Gate::Question => UiTarget::Question,
            Gate::ClearPath1 => UiTarget::ClearButton,
            Gate::Overlay2 => UiTarget::Overlay2,
            Gate::ClearPath2 => UiTarget::ClearButton2,
            Gate::AddSign => UiTarget::AddSignButton,
        }
    }

    pub(crate) fn stage(self) -> Stage {
        match self {
            Gate::StartOverlay => Stage::Start,
            Gate::Question => Stage::Question,
            Gate::ClearPath1 => Stage::ClearPath1,
            Gate::Overlay2 => Stage::Overlay2,
            Gate::ClearPath2 => Stage::ClearPath2,
            Gate::AddSign => Stage::AddSign,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum Worker {
    Tripping,
    Safe,
    WalkingSafe,
    Slipping,
    Slipping2,
    SafeSign,
    Pallet,
}

impl Worker {
    pub(crate) const ALL: [Worker; 7] = [
        Worker::Tripping,
        Worker::Safe,
        Worker::WalkingSafe,
        Worker::Slipping,
        Worker::Slipping2,
        Worker::SafeSign,
        Worker::Pallet,
    ];

    fn index(self) -> usize {
        self as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum UiTarget {
    Overlay,
    Question,
    Overlay2,
    NoteWetFloor,
    ClearButton,
    ClearButton2,
    AddSignButton,
}

impl UiTarget {
    pub(crate) const ALL: [UiTarget; 7] = [
        UiTarget::Overlay,
        UiTarget::Question,
        UiTarget::Overlay2,
        UiTarget::NoteWetFloor,
        UiTarget::ClearButton,
        UiTarget::ClearButton2,
        UiTarget::AddSignButton,
    ];

    pub(crate) fn dom_id(self) -> &'static str {
        match self {
            UiTarget::Overlay => "overlay",
            UiTarget::Question => "question",
            UiTarget::Overlay2 => "overlay2",
            UiTarget::NoteWetFloor => "note-wetfloor",
            UiTarget::ClearButton => "clear-button",
            UiTarget::ClearButton2 => "clear-button-2",
            UiTarget::AddSignButton => "add-sign-button",
        }
    }

    pub(crate) fn kind(self) -> ElementKind {
        match self {
            UiTarget::ClearButton | UiTarget::ClearButton2 | UiTarget::AddSignButton => {
                ElementKind::Button
            }
            UiTarget::Overlay
            | UiTarget::Question
            | UiTarget::Overlay2
            | UiTarget::NoteWetFloor => ElementKind::Overlay,
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

/// Nullable references to the scene's worker nodes. A disposed worker's slot
/// is cleared and never refilled.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct WorkerSlots {
    slots: [Option<NodeId>; 7],
}

impl WorkerSlots {
    pub(crate) fn with(mut self, worker: Worker, node: Option<NodeId>) -> Self {
        self.slots[worker.index()] = node;
        self
    }

    pub(crate) fn get(&self, worker: Worker) -> Option<NodeId> {
        self.slots[worker.index()]
    }

    pub(crate) fn slot_mut(&mut self, worker: Worker) -> &mut Option<NodeId> {
        &mut self.slots[worker.index()]
    }

    pub(crate) fn nodes(&self, workers: &[Worker]) -> Vec<Option<NodeId>> {
        workers.iter().map(|worker| self.get(*worker)).collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct UiTargets {
    elements: [Option<ElementId>; 7],
}

impl UiTargets {
    pub(crate) fn resolve(ui: &UiLayer) -> Self {
        let mut targets = Self::default();
        for target in UiTarget::ALL {
            targets.elements[target.index()] = ui.element_by_dom_id(target.dom_id());
        }
        targets
    }

    pub(crate) fn get(&self, target: UiTarget) -> Option<ElementId> {
        self.elements[target.index()]
    }

    pub(crate) fn elements(&self, targets: &[UiTarget]) -> Vec<Option<ElementId>> {
        targets.iter().map(|target| self.get(*target)).collect()
    }

    pub(crate) fn target_of(&self, element: ElementId) -> Option<UiTarget> {
        UiTarget::ALL
            .into_iter()
            .find(|target| self.get(*target) == Some(element))
    }
}

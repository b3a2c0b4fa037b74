//! Interaction state for one user session.
//!
//! `Session` is a plain value: every handler takes the current one and returns
//! the next, nothing is mutated in place.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    /// Form editable, nothing shown.
    #[default]
    Idle,
    /// An itinerary is being generated or is on screen.
    Showing,
}

/// User-visible notices raised by a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notice {
    ClearFirst,
}

impl Notice {
    pub fn message(&self) -> &'static str {
        match self {
            Notice::ClearFirst => "Clear first!",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Session {
    phase: Phase,
    form_disabled: bool,
}

/// Outcome of a submit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub session: Session,
    pub notice: Option<Notice>,
    /// The caller should start a generation for the current form values.
    pub start_generation: bool,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_form_enabled(&self) -> bool {
        !self.form_disabled
    }

    pub fn is_showing(&self) -> bool {
        self.phase == Phase::Showing
    }

    /// Idle → Showing with the form locked. While already showing, the request
    /// is refused and the session is returned unchanged.
    pub fn submit(self) -> Transition {
        match self.phase {
            Phase::Idle => Transition {
                session: Session {
                    phase: Phase::Showing,
                    form_disabled: true,
                },
                notice: None,
                start_generation: true,
            },
            Phase::Showing => Transition {
                session: self,
                notice: Some(Notice::ClearFirst),
                start_generation: false,
            },
        }
    }

    /// Always back to an editable idle form.
    pub fn clear(self) -> Session {
        Session::default()
    }
}

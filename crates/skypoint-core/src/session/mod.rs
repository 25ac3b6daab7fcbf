// Session data model: room codes, participants, shared state, backlog.

pub mod backlog;
pub mod code;
pub mod participant;
pub mod state;

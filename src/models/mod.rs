pub mod account;
pub mod code_playback;
pub mod integrity_log;
pub mod proctor_event;
pub mod proctor_session;

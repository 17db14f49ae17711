//! Service layer holding the quiz business logic.

pub mod badges;
pub mod buzz;
pub mod documentation;
pub mod health_service;
pub mod leaderboard;
pub mod set_service;
pub mod sse_events;
pub mod sse_service;
pub mod storage_supervisor;
pub mod user_service;

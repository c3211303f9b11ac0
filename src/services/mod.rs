/// Challenge counting and per-player progress.
pub mod challenge_tracker;
/// Event fan-out helpers used by the sync engine.
pub mod events;
/// User-triggered game operations.
pub mod game_service;
/// Optimistic team scores.
pub mod score_tracker;
/// Polling driver keeping the local view converged with the server.
pub mod sync_engine;
/// Team selection with capacity checks and single-flight moves.
pub mod team_coordinator;

pub mod leaderboard;
pub mod quest_state;

pub use leaderboard::LeaderboardCache;
pub use quest_state::QuestStateMachine;

pub mod auth_service;
pub mod auth_service_impl;
pub mod login_throttle;
pub mod ranking;
pub mod scoring_service;
pub mod scoring_service_impl;
pub mod session;

pub use auth_service::{AuthError, AuthService, ClientInfo, LoginResult};
pub use auth_service_impl::AdminAuthService;
pub use login_throttle::LoginThrottle;
pub use scoring_service::{
    EntryOutcome, FetchFailure, LeaderboardRow, MonthlyLeaderboard, MonthlyRow, ScoringError,
    ScoringService, WeeklyLeaderboard, WeeklyPoints,
};
pub use scoring_service_impl::FplScoringService;
pub use session::{AdminSession, SessionManager};

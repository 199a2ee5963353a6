pub mod garmin;
pub mod recovery;

pub use garmin::GarminActivity;
pub use recovery::DailyRecovery;

pub mod doctor;
pub mod journal;
pub mod schedule;
pub mod session;
pub mod swarm;
pub mod up;

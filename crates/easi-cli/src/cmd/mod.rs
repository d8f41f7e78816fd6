pub mod action;
pub mod feedback;
pub mod init;
pub mod intake;
pub mod serve;
pub mod tasks;

pub use daemon::Daemon;

mod daemon;

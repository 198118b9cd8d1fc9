//! Scheduling engine for Supertask.
//!
//! This crate provides:
//! - A cron trigger evaluated in a configurable timezone
//! - The scheduler core: job lifecycle, trigger loop and concurrency policy
//! - Two bounded executor lanes (in-process and child-process)
//! - The step runner that executes a task's steps in order
//! - Timetable reconciliation and a debounced file watcher
//! - The [`Supertask`] context tying them together

pub mod app;
pub mod engine;
pub mod error;
pub mod executor;
pub mod reconcile;
pub mod runner;
pub mod trigger;
pub mod watcher;

pub use app::Supertask;
pub use engine::{JobOptions, JobState, Registration, Scheduler};
pub use error::ExecutionError;
pub use executor::{ExecutorPool, ProcessLauncher};
pub use reconcile::{ReconcilePlan, ReconcileReport, Reconciler};
pub use runner::{CallableRegistry, StepKind, StepRunner};
pub use trigger::CronTrigger;
pub use watcher::FileWatcher;

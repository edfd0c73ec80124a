//! Integration tests for rampart hardening runs
//!
//! These tests drive transactions, steps and the orchestrator together
//! against temporary directories, with scripted commands and answers.

pub mod helpers;
pub mod orchestration;
pub mod ssh_hardening;
pub mod transactions;

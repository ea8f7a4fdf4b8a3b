//! Strand Concierge - Conversational Hair Care Diagnosis
//!
//! This crate implements a guarded diagnostic chat that narrows a free-text
//! hair concern to one of four vitals, plus a streaming pipeline that turns a
//! structured intake questionnaire into a personalized routine with product
//! recommendations.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;

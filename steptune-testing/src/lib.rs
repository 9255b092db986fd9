//! ABOUTME: Test utilities and mock implementations for steptune testing
//! ABOUTME: Provides MockSamplerProvider, MockInvoker, and workflow definition fixtures

pub mod definitions;
pub mod mocks;

pub use mocks::{MockInvoker, MockSampler, MockSamplerProvider};

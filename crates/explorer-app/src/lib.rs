// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

pub mod format;
pub mod lifecycle;
pub mod model;
pub mod notify;
pub mod projector;
pub mod state;

pub use format::*;
pub use lifecycle::*;
pub use model::*;
pub use notify::*;
pub use projector::*;
pub use state::*;

// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

pub mod collection;
pub mod format;
pub mod forms;
pub mod ids;
pub mod model;
pub mod state;

pub use collection::*;
pub use format::*;
pub use forms::*;
pub use ids::*;
pub use model::*;
pub use state::*;

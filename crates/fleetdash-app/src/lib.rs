// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

pub mod context;
pub mod dashboard;
pub mod error;
pub mod ids;
pub mod layout;
pub mod model;
pub mod queries;
pub mod state;
pub mod view;

pub use context::*;
pub use dashboard::*;
pub use error::*;
pub use ids::*;
pub use layout::*;
pub use model::*;
pub use queries::*;
pub use state::*;
pub use view::*;

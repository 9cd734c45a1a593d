// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

mod store;

pub use store::{
    CaseFlag, CaseRecord, ModuleRecord, NewRegr, NewSim, NewTask, ProjectRecord, RegrRecord,
    RegrStore, SimFilter, SimRecord, TaskRecord,
};

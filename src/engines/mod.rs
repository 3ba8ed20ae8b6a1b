// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

pub mod body_decoder;
pub mod chromium_session;
pub mod traits;

// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Tests for the content cache
//!
//! Both stores are exercised through the same scenarios.

mod content_cache_tests;

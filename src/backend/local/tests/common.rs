//
// Copyright 2018 yvt, all rights reserved.
//
// This source code is a part of Nightingales.
//
#![warn(rust_2018_idioms)]

use taskhal_base as base;
use taskhal_local as backend;

use taskhal_test::taskhal_generate_backend_tests;

struct TestDriver;

impl taskhal_test::backend_tests::TestDriver for TestDriver {
    fn for_each_device(&self, runner: &mut dyn FnMut(&base::DeviceRef)) {
        let device = backend::DeviceBuilder::new()
            .worker_count(4)
            .queue_count(2)
            .block_size(4096)
            .identifier("test")
            .build()
            .unwrap();
        runner(&(device as base::DeviceRef));
    }
}

taskhal_generate_backend_tests!(TestDriver);

//
// Copyright 2018 yvt, all rights reserved.
//
// This source code is a part of Nightingales.
//
use std::sync::Arc;

use super::TestDriver;
use crate::utils;
use taskhal_base::{self as base, prelude::*, StageFlags};

pub fn event_orders_cmd_buffers<T: TestDriver>(driver: T) {
    driver.for_each_queue(&mut |device, queue| {
        let src = device.new_buffer(512).unwrap();
        let dst = device.new_buffer(512).unwrap();
        let event = base::Event::with_label("fill done");

        println!("- Recording the producer");
        let mut producer = utils::new_cmd_buffer(device, base::CmdBufferMode::ONE_SHOT);
        producer.begin().unwrap();
        producer.fill_buffer(&src, 0, 512, &[0x77]).unwrap();
        producer.signal_event(&event, StageFlags::TRANSFER).unwrap();
        producer.end().unwrap();

        println!("- Recording the consumer");
        let mut consumer = utils::new_cmd_buffer(device, base::CmdBufferMode::ONE_SHOT);
        consumer.begin().unwrap();
        consumer
            .wait_events(
                &[event.clone()],
                StageFlags::TRANSFER,
                StageFlags::TRANSFER,
                &[],
                &[],
            )
            .unwrap();
        consumer.copy_buffer(&src, 0, &dst, 0, 512).unwrap();
        consumer.reset_event(&event, StageFlags::TRANSFER).unwrap();
        consumer.end().unwrap();

        println!("- Submitting both in a single batch");
        let cmd_buffers: [base::CmdSequenceRef; 2] = [Arc::new(producer), Arc::new(consumer)];
        utils::submit_and_wait(device, queue, &cmd_buffers).unwrap();

        assert!(utils::read_buffer(&dst).iter().all(|&x| x == 0x77));
    });
}

//
// Copyright 2018 yvt, all rights reserved.
//
// This source code is a part of Nightingales.
//
use std::sync::Arc;
use std::time::Duration;

use super::TestDriver;
use crate::utils;
use taskhal_base::{self as base, prelude::*, AccessTypeFlags, StageFlags};
use taskhal_common::Timeout;

pub fn copy_fill_buffer<T: TestDriver>(driver: T) {
    driver.for_each_queue(&mut |device, queue| {
        println!("- Creating a buffer");
        let buffer = device.new_buffer(2048).unwrap();

        println!("- Recording a command buffer");
        let mut cmd_buffer = utils::new_cmd_buffer(device, base::CmdBufferMode::ONE_SHOT);
        cmd_buffer.begin().unwrap();
        cmd_buffer.begin_debug_group("fill").unwrap();
        cmd_buffer.fill_buffer(&buffer, 0, 400, &[0x12]).unwrap();
        cmd_buffer.fill_buffer(&buffer, 800, 400, &[0xaf]).unwrap();
        cmd_buffer
            .fill_buffer(&buffer, 1600, 16, &[1, 2, 3, 4])
            .unwrap();
        cmd_buffer.end_debug_group().unwrap();
        cmd_buffer.end().unwrap();

        println!("- Submitting the command buffer");
        utils::submit_and_wait(device, queue, &[Arc::new(cmd_buffer)]).unwrap();

        println!("- Reading back the result");
        let data = utils::read_buffer(&buffer);
        assert!(data[0..400].iter().all(|&x| x == 0x12));
        assert!(data[400..800].iter().all(|&x| x == 0));
        assert!(data[800..1200].iter().all(|&x| x == 0xaf));
        assert_eq!(&data[1600..1608], &[1, 2, 3, 4, 1, 2, 3, 4]);
        assert!(data[1616..].iter().all(|&x| x == 0));
    });
}

pub fn copy_update_buffer<T: TestDriver>(driver: T) {
    driver.for_each_queue(&mut |device, queue| {
        let buffer = device.new_buffer(64).unwrap();
        let data: Vec<u8> = (1..=32).collect();

        println!("- Recording a command buffer");
        let mut cmd_buffer = utils::new_cmd_buffer(device, base::CmdBufferMode::ONE_SHOT);
        cmd_buffer.begin().unwrap();
        cmd_buffer.update_buffer(&data, &buffer, 8).unwrap();
        cmd_buffer.end().unwrap();

        println!("- Submitting the command buffer");
        utils::submit_and_wait(device, queue, &[Arc::new(cmd_buffer)]).unwrap();

        let contents = utils::read_buffer(&buffer);
        assert!(contents[0..8].iter().all(|&x| x == 0));
        assert_eq!(&contents[8..40], &data[..]);
        assert!(contents[40..].iter().all(|&x| x == 0));
    });
}

pub fn copy_fill_then_copy<T: TestDriver>(driver: T) {
    driver.for_each_queue(&mut |device, queue| {
        let src = device.new_buffer(256).unwrap();
        let dst = device.new_buffer(256).unwrap();

        println!("- Recording a command buffer");
        let mut cmd_buffer = utils::new_cmd_buffer(device, base::CmdBufferMode::ONE_SHOT);
        cmd_buffer.begin().unwrap();
        cmd_buffer.fill_buffer(&src, 0, 256, &[0x5a]).unwrap();
        cmd_buffer
            .execution_barrier(
                StageFlags::TRANSFER,
                StageFlags::TRANSFER,
                &[],
                &[base::BufferBarrier {
                    src_access: AccessTypeFlags::TRANSFER_WRITE,
                    dst_access: AccessTypeFlags::TRANSFER_READ,
                    buffer: src.clone(),
                    range: 0..256,
                }],
            )
            .unwrap();
        cmd_buffer.copy_buffer(&src, 0, &dst, 64, 128).unwrap();
        cmd_buffer.end().unwrap();

        println!("- Submitting the command buffer");
        utils::submit_and_wait(device, queue, &[Arc::new(cmd_buffer)]).unwrap();

        let data = utils::read_buffer(&dst);
        assert!(data[0..64].iter().all(|&x| x == 0));
        assert!(data[64..192].iter().all(|&x| x == 0x5a));
        assert!(data[192..].iter().all(|&x| x == 0));
    });
}

pub fn copy_across_batches<T: TestDriver>(driver: T) {
    driver.for_each_queue(&mut |device, queue| {
        let src = device.new_buffer(128).unwrap();
        let dst = device.new_buffer(128).unwrap();
        let semaphore = device.new_semaphore(0).unwrap();

        println!("- Recording command buffers");
        let mut fill = utils::new_cmd_buffer(device, base::CmdBufferMode::ONE_SHOT);
        fill.begin().unwrap();
        fill.fill_buffer(&src, 0, 128, &[0x33]).unwrap();
        fill.end().unwrap();

        let mut copy = utils::new_cmd_buffer(device, base::CmdBufferMode::ONE_SHOT);
        copy.begin().unwrap();
        copy.copy_buffer(&src, 0, &dst, 0, 128).unwrap();
        copy.end().unwrap();

        let fill: [base::CmdSequenceRef; 1] = [Arc::new(fill)];
        let copy: [base::CmdSequenceRef; 1] = [Arc::new(copy)];
        let semaphores = [semaphore.clone()];

        println!("- Submitting two batches chained by a semaphore");
        queue
            .submit_and_wait(
                &[
                    base::SubmissionBatch {
                        command_buffers: &fill,
                        signal: base::SemaphoreList::new(&semaphores, &[1]),
                        ..Default::default()
                    },
                    base::SubmissionBatch {
                        command_buffers: &copy,
                        wait: base::SemaphoreList::new(&semaphores, &[1]),
                        signal: base::SemaphoreList::new(&semaphores, &[2]),
                    },
                ],
                &semaphore,
                2,
                Timeout::After(Duration::from_secs(10)),
            )
            .unwrap();

        assert!(utils::read_buffer(&dst).iter().all(|&x| x == 0x33));
    });
}

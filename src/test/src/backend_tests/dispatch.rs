//
// Copyright 2018 yvt, all rights reserved.
//
// This source code is a part of Nightingales.
//
use std::sync::Arc;

use super::TestDriver;
use crate::utils;
use taskhal_base::{self as base, prelude::*, AccessTypeFlags, StageFlags};

fn whole_buffer(binding: u32, buffer: &base::BufferRef) -> base::DescriptorBinding {
    base::DescriptorBinding {
        binding,
        buffer: buffer.clone(),
        offset: 0,
        len: buffer.len(),
    }
}

pub fn dispatch_every_workgroup<T: TestDriver>(driver: T) {
    driver.for_each_queue(&mut |device, queue| {
        const GRID: [u32; 3] = [4, 3, 2];
        let count = 24;

        println!("- Creating a buffer");
        let output = device.new_buffer(count * 4).unwrap();

        println!("- Creating an executable");
        let executable = utils::FnExecutable::new(|state, [x, y, z]| {
            let index = x as u64 + y as u64 * 4 + z as u64 * 12;
            let base_value = utils::push_constant_u32(state, 0);
            utils::store_u32(state, 0, index, base_value + index as u32)
        });
        let layout = base::PipelineLayout::new(4, 1).unwrap();

        println!("- Recording a command buffer");
        let mut cmd_buffer = utils::new_cmd_buffer(device, base::CmdBufferMode::ONE_SHOT);
        cmd_buffer.begin().unwrap();
        cmd_buffer
            .push_constants(&layout, 0, &100u32.to_le_bytes())
            .unwrap();
        cmd_buffer
            .push_descriptor_set(&layout, 0, &[whole_buffer(0, &output)])
            .unwrap();
        cmd_buffer.dispatch(&executable, 0, GRID).unwrap();
        cmd_buffer.end().unwrap();

        println!("- Submitting the command buffer");
        utils::submit_and_wait(device, queue, &[Arc::new(cmd_buffer)]).unwrap();

        let result = utils::read_u32s(&output);
        let expected: Vec<u32> = (0..count as u32).map(|i| 100 + i).collect();
        assert_eq!(result, expected);
    });
}

pub fn dispatch_barrier_orders_work<T: TestDriver>(driver: T) {
    driver.for_each_queue(&mut |device, queue| {
        let count = 256u32;
        let first = device.new_buffer(count as u64 * 4).unwrap();
        let second = device.new_buffer(count as u64 * 4).unwrap();

        println!("- Creating executables");
        let producer = utils::FnExecutable::new(|state, [x, _, _]| {
            utils::store_u32(state, 0, x as u64, x * 2)
        });
        let consumer = utils::FnExecutable::new(|state, [x, _, _]| {
            let value = utils::load_u32(state, 0, x as u64)?;
            utils::store_u32(state, 1, x as u64, value + 1)
        });
        let layout = base::PipelineLayout::new(0, 1).unwrap();

        println!("- Recording a command buffer");
        let mut cmd_buffer = utils::new_cmd_buffer(device, base::CmdBufferMode::ONE_SHOT);
        cmd_buffer.begin().unwrap();
        cmd_buffer
            .push_descriptor_set(
                &layout,
                0,
                &[whole_buffer(0, &first), whole_buffer(1, &second)],
            )
            .unwrap();
        cmd_buffer.dispatch(&producer, 0, [count, 1, 1]).unwrap();
        cmd_buffer
            .execution_barrier(
                StageFlags::DISPATCH,
                StageFlags::DISPATCH,
                &[base::MemoryBarrier {
                    src_access: AccessTypeFlags::DISPATCH_WRITE,
                    dst_access: AccessTypeFlags::DISPATCH_READ,
                }],
                &[],
            )
            .unwrap();
        cmd_buffer.dispatch(&consumer, 0, [count, 1, 1]).unwrap();
        cmd_buffer.end().unwrap();

        println!("- Submitting the command buffer");
        utils::submit_and_wait(device, queue, &[Arc::new(cmd_buffer)]).unwrap();

        let result = utils::read_u32s(&second);
        let expected: Vec<u32> = (0..count).map(|i| i * 2 + 1).collect();
        assert_eq!(result, expected);
    });
}

pub fn dispatch_indirect<T: TestDriver>(driver: T) {
    driver.for_each_queue(&mut |device, queue| {
        let args = device.new_buffer(16).unwrap();
        let output = device.new_buffer(64 * 4).unwrap();

        let executable = utils::FnExecutable::new(|state, [x, y, _]| {
            utils::store_u32(state, 0, x as u64 + y as u64 * 16, 1)
        });
        let layout = base::PipelineLayout::new(0, 1).unwrap();

        println!("- Recording a command buffer");
        let mut cmd_buffer = utils::new_cmd_buffer(device, base::CmdBufferMode::ONE_SHOT);
        cmd_buffer.begin().unwrap();

        // The workgroup count is written by the device, so it is only
        // known when the dispatch executes
        cmd_buffer
            .update_buffer(&utils::u32s_to_bytes(&[16, 2, 1]), &args, 4)
            .unwrap();
        cmd_buffer
            .execution_barrier(
                StageFlags::TRANSFER,
                StageFlags::INDIRECT,
                &[base::MemoryBarrier {
                    src_access: AccessTypeFlags::TRANSFER_WRITE,
                    dst_access: AccessTypeFlags::INDIRECT_READ,
                }],
                &[],
            )
            .unwrap();
        cmd_buffer
            .push_descriptor_set(&layout, 0, &[whole_buffer(0, &output)])
            .unwrap();
        cmd_buffer.dispatch_indirect(&executable, 0, &args, 4).unwrap();
        cmd_buffer.end().unwrap();

        println!("- Submitting the command buffer");
        utils::submit_and_wait(device, queue, &[Arc::new(cmd_buffer)]).unwrap();

        let result = utils::read_u32s(&output);
        assert!(result[0..32].iter().all(|&x| x == 1));
        assert!(result[32..].iter().all(|&x| x == 0));
    });
}

pub fn dispatch_indirect_rejects_oversized_grid<T: TestDriver>(driver: T) {
    driver.for_each_queue(&mut |device, queue| {
        let args = device.new_buffer(12).unwrap();
        let output = device.new_buffer(4).unwrap();

        let executable = utils::FnExecutable::new(|state, _| utils::store_u32(state, 0, 0, 1));
        let layout = base::PipelineLayout::new(0, 1).unwrap();

        println!("- Recording a command buffer");
        let mut cmd_buffer = utils::new_cmd_buffer(device, base::CmdBufferMode::ONE_SHOT);
        cmd_buffer.begin().unwrap();
        cmd_buffer
            .update_buffer(&utils::u32s_to_bytes(&[1 << 22; 3]), &args, 0)
            .unwrap();
        cmd_buffer
            .execution_barrier(
                StageFlags::TRANSFER,
                StageFlags::INDIRECT,
                &[base::MemoryBarrier {
                    src_access: AccessTypeFlags::TRANSFER_WRITE,
                    dst_access: AccessTypeFlags::INDIRECT_READ,
                }],
                &[],
            )
            .unwrap();
        cmd_buffer
            .push_descriptor_set(&layout, 0, &[whole_buffer(0, &output)])
            .unwrap();
        cmd_buffer.dispatch_indirect(&executable, 0, &args, 0).unwrap();
        cmd_buffer.end().unwrap();

        println!("- Submitting the command buffer");
        let e = utils::submit_and_wait(device, queue, &[Arc::new(cmd_buffer)]).unwrap_err();
        println!("  Error = {}", e);
        assert!(!e.is_deadline_exceeded());
        assert_eq!(utils::read_u32s(&output), vec![0]);
    });
}

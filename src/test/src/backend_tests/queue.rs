//
// Copyright 2018 yvt, all rights reserved.
//
// This source code is a part of Nightingales.
//
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::TestDriver;
use crate::utils;
use taskhal_base::{self as base, prelude::*};
use taskhal_common::{ErrorKind, Timeout};

const TIMEOUT: Timeout = Timeout::After(Duration::from_secs(10));

fn fill_cmd_buffer(
    device: &base::DeviceRef,
    mode: base::CmdBufferMode,
    buffer: &base::BufferRef,
    value: u8,
) -> base::CmdSequenceRef {
    let mut cmd_buffer = utils::new_cmd_buffer(device, mode);
    cmd_buffer.begin().unwrap();
    cmd_buffer
        .fill_buffer(buffer, 0, buffer.len(), &[value])
        .unwrap();
    cmd_buffer.end().unwrap();
    Arc::new(cmd_buffer)
}

pub fn queue_wait_idle_empty<T: TestDriver>(driver: T) {
    driver.for_each_queue(&mut |_, queue| {
        println!("- Waiting for the queue to be idle");
        queue.wait_idle(Timeout::Immediate).unwrap();
    });
}

pub fn queue_empty_batch_signals<T: TestDriver>(driver: T) {
    driver.for_each_queue(&mut |device, queue| {
        println!("- Creating a semaphore");
        let semaphore = device.new_semaphore(0).unwrap();

        println!("- Submitting an empty batch");
        queue
            .submit_and_wait(
                &[base::SubmissionBatch {
                    signal: base::SemaphoreList::new(&[semaphore.clone()], &[5]),
                    ..Default::default()
                }],
                &semaphore,
                5,
                TIMEOUT,
            )
            .unwrap();
        assert_eq!(semaphore.query().unwrap(), 5);
    });
}

pub fn queue_wait_semaphore_defers_issue<T: TestDriver>(driver: T) {
    driver.for_each_queue(&mut |device, queue| {
        let gate = device.new_semaphore(0).unwrap();
        let done = device.new_semaphore(0).unwrap();
        let buffer = device.new_buffer(64).unwrap();
        let cmd_buffers = [fill_cmd_buffer(
            device,
            base::CmdBufferMode::ONE_SHOT,
            &buffer,
            0xab,
        )];

        println!("- Submitting a batch waiting on a semaphore");
        queue
            .submit(&[base::SubmissionBatch {
                wait: base::SemaphoreList::new(&[gate.clone()], &[1]),
                signal: base::SemaphoreList::new(&[done.clone()], &[1]),
                command_buffers: &cmd_buffers,
            }])
            .unwrap();

        println!("- Checking that the batch has not executed");
        let e = queue
            .wait_idle(Timeout::After(Duration::from_millis(20)))
            .unwrap_err();
        assert!(e.is_deadline_exceeded());
        assert_eq!(done.query().unwrap(), 0);
        assert!(utils::read_buffer(&buffer).iter().all(|&x| x == 0));

        println!("- Signaling the semaphore");
        gate.signal(1).unwrap();
        done.wait(1, TIMEOUT).unwrap();
        queue.wait_idle(TIMEOUT).unwrap();
        assert!(utils::read_buffer(&buffer).iter().all(|&x| x == 0xab));
    });
}

pub fn queue_unsignaled_wait_times_out<T: TestDriver>(driver: T) {
    driver.for_each_queue(&mut |device, queue| {
        let gate = device.new_semaphore(0).unwrap();
        let done = device.new_semaphore(0).unwrap();

        println!("- Submitting a batch waiting on a semaphore that is never signaled");
        let start = Instant::now();
        let e = queue
            .submit_and_wait(
                &[base::SubmissionBatch {
                    wait: base::SemaphoreList::new(&[gate.clone()], &[1]),
                    signal: base::SemaphoreList::new(&[done.clone()], &[1]),
                    ..Default::default()
                }],
                &done,
                1,
                Timeout::After(Duration::from_millis(30)),
            )
            .unwrap_err();
        assert!(e.is_deadline_exceeded());
        assert!(start.elapsed() >= Duration::from_millis(30));
        assert!(start.elapsed() < Duration::from_secs(5));

        println!("- Retrying after the semaphore is signaled");
        gate.signal(1).unwrap();
        done.wait(1, TIMEOUT).unwrap();
        queue.wait_idle(TIMEOUT).unwrap();
    });
}

pub fn queue_rejects_mismatched_batch<T: TestDriver>(driver: T) {
    driver.for_each_queue(&mut |device, queue| {
        let semaphore = device.new_semaphore(0).unwrap();
        let e = queue
            .submit(&[base::SubmissionBatch {
                signal: base::SemaphoreList::new(&[semaphore.clone()], &[]),
                ..Default::default()
            }])
            .unwrap_err();
        assert_eq!(e.kind(), ErrorKind::InvalidArgument);
        queue.wait_idle(Timeout::Immediate).unwrap();
    });
}

pub fn queue_rejects_unfinished_cmd_buffer<T: TestDriver>(driver: T) {
    driver.for_each_queue(&mut |device, queue| {
        let mut cmd_buffer = utils::new_cmd_buffer(device, base::CmdBufferMode::empty());
        cmd_buffer.begin().unwrap();
        let cmd_buffers: [base::CmdSequenceRef; 1] = [Arc::new(cmd_buffer)];

        println!("- Submitting a command buffer that is still recording");
        let e = queue
            .submit(&[base::SubmissionBatch {
                command_buffers: &cmd_buffers,
                ..Default::default()
            }])
            .unwrap_err();
        assert_eq!(e.kind(), ErrorKind::FailedPrecondition);
    });
}

pub fn queue_one_shot_resubmit_fails<T: TestDriver>(driver: T) {
    driver.for_each_queue(&mut |device, queue| {
        let buffer = device.new_buffer(16).unwrap();
        let cmd_buffers = [fill_cmd_buffer(
            device,
            base::CmdBufferMode::ONE_SHOT,
            &buffer,
            1,
        )];

        println!("- Submitting a one-shot command buffer");
        utils::submit_and_wait(device, queue, &cmd_buffers).unwrap();
        assert!(utils::read_buffer(&buffer).iter().all(|&x| x == 1));

        println!("- Submitting it again");
        let e = queue
            .submit(&[base::SubmissionBatch {
                command_buffers: &cmd_buffers,
                ..Default::default()
            }])
            .unwrap_err();
        assert_eq!(e.kind(), ErrorKind::FailedPrecondition);
    });
}

pub fn queue_reusable_resubmit<T: TestDriver>(driver: T) {
    driver.for_each_queue(&mut |device, queue| {
        let src = device.new_buffer(16).unwrap();
        let dst = device.new_buffer(16).unwrap();

        let mut cmd_buffer = utils::new_cmd_buffer(device, base::CmdBufferMode::empty());
        cmd_buffer.begin().unwrap();
        cmd_buffer.copy_buffer(&src, 0, &dst, 0, 16).unwrap();
        cmd_buffer.end().unwrap();
        let cmd_buffers: [base::CmdSequenceRef; 1] = [Arc::new(cmd_buffer)];

        for i in 1..=3u8 {
            println!("- Submission #{}", i);
            src.fill(0, 16, &[i]).unwrap();
            utils::submit_and_wait(device, queue, &cmd_buffers).unwrap();
            assert!(utils::read_buffer(&dst).iter().all(|&x| x == i));
        }
    });
}

pub fn queue_failure_propagates<T: TestDriver>(driver: T) {
    driver.for_each_queue(&mut |device, queue| {
        let executable = utils::FnExecutable::new(|_, _| {
            Err(taskhal_common::Error::with_detail(
                ErrorKind::Internal,
                "kernel failure",
            ))
        });

        let mut cmd_buffer = utils::new_cmd_buffer(device, base::CmdBufferMode::ONE_SHOT);
        cmd_buffer.begin().unwrap();
        cmd_buffer.dispatch(&executable, 0, [2, 1, 1]).unwrap();
        cmd_buffer.end().unwrap();
        let cmd_buffers: [base::CmdSequenceRef; 1] = [Arc::new(cmd_buffer)];

        println!("- Submitting a failing dispatch");
        let semaphore = device.new_semaphore(0).unwrap();
        let e = queue
            .submit_and_wait(
                &[base::SubmissionBatch {
                    command_buffers: &cmd_buffers,
                    signal: base::SemaphoreList::new(&[semaphore.clone()], &[1]),
                    ..Default::default()
                }],
                &semaphore,
                1,
                TIMEOUT,
            )
            .unwrap_err();
        println!("  Error = {}", e);
        assert!(!e.is_deadline_exceeded());

        println!("- Checking that the failure is observable");
        assert!(semaphore.wait(1, TIMEOUT).is_err());
        let e = queue.wait_idle(TIMEOUT).unwrap_err();
        assert!(!e.is_deadline_exceeded());
    });
}

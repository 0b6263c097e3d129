//! Stack driver shared by top-level runs and forks.

use super::frame::{Frame, FrameStatus};
use super::PipelineMachine;
use crate::errors::Failure;

/// Where a stack of frames stopped.
pub(crate) enum Drive {
    /// The top frame is suspended; the stack holds every frame still alive.
    Paused,
    /// The bottom frame ended; the stack is empty.
    Completed(Result<(), Failure>),
}

/// Steps the top frame of `stack` until the stack pauses or empties.
///
/// A frame that ends is popped and its result delivered to the frame below,
/// which then continues after the interceptor that forked it.
pub(crate) fn drive(stack: &mut Vec<Box<dyn Frame>>, machine: &PipelineMachine) -> Drive {
    loop {
        let Some(top) = stack.last_mut() else {
            return Drive::Completed(Ok(()));
        };
        match top.run(machine) {
            FrameStatus::Paused => return Drive::Paused,
            FrameStatus::Forked(children) => {
                stack.extend(children);
                return Drive::Paused;
            }
            FrameStatus::Done(result) => {
                stack.pop();
                match stack.last_mut() {
                    Some(parent) => parent.child_completed(result),
                    None => return Drive::Completed(result),
                }
            }
        }
    }
}

/// Abandons every frame of `stack`, innermost first.
pub(crate) fn abort_stack(stack: Vec<Box<dyn Frame>>, failure: Failure) -> Failure {
    stack
        .into_iter()
        .rev()
        .fold(failure, |failure, mut frame| frame.abort(failure))
}

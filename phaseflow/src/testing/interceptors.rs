//! Ready-made interceptors for tests.

use super::OrderRecorder;
use crate::context::PipelineContext;

/// An interceptor that records `label` and continues.
pub fn recording<T>(
    recorder: &OrderRecorder,
    label: impl Into<String>,
) -> impl Fn(&mut PipelineContext<'_, T>, &mut T) -> anyhow::Result<()> + Send + Sync + 'static
where
    T: Send + 'static,
{
    let recorder = recorder.clone();
    let label = label.into();
    move |_ctx: &mut PipelineContext<'_, T>, _subject: &mut T| {
        recorder.push(label.clone());
        Ok(())
    }
}

/// An interceptor that pauses the run.
pub fn pausing<T>(
) -> impl Fn(&mut PipelineContext<'_, T>, &mut T) -> anyhow::Result<()> + Send + Sync + 'static
where
    T: Send + 'static,
{
    |ctx: &mut PipelineContext<'_, T>, _subject: &mut T| {
        ctx.pause();
        Ok(())
    }
}

/// An interceptor that fails the run with `message`.
pub fn failing<T>(
    message: &'static str,
) -> impl Fn(&mut PipelineContext<'_, T>, &mut T) -> anyhow::Result<()> + Send + Sync + 'static
where
    T: Send + 'static,
{
    move |_ctx: &mut PipelineContext<'_, T>, _subject: &mut T| Err(anyhow::anyhow!(message))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{Phase, Pipeline};

    #[test]
    fn test_helpers_drive_expected_outcomes() {
        let call = Phase::new("Call");
        let recorder = OrderRecorder::new();

        let mut pipeline = Pipeline::<()>::new([call.clone()]).unwrap();
        pipeline.intercept(&call, recording(&recorder, "first")).unwrap();
        pipeline.intercept(&call, pausing()).unwrap();
        pipeline.intercept(&call, failing("boom")).unwrap();

        assert!(pipeline.execute(()).is_executing());
        assert_eq!(recorder.entries(), vec!["first"]);
    }
}

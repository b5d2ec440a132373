//! Runtime-assembled pipelines over boxed stages.
//!
//! The combinators in the parent module settle argument forwarding at
//! compile time; this is the escape hatch for stage lists that are only
//! known at runtime. Each stage declares up front whether it consumes the
//! previous result, and the declared value types are checked with
//! `TypeId` when the stage is pushed. A pipeline that assembled will not
//! trip over types while running.

use std::any::{type_name, Any, TypeId};

use crate::error::Error;
use crate::invoke::Invoke;

/// Values travelling between stages.
pub type BoxedValue = Box<dyn Any + Send>;

enum Stage {
  /// Consumes the previous stage's value.
  Feed(Box<dyn FnMut(BoxedValue) -> BoxedValue + Send>),
  /// Takes nothing; any previous value is dropped.
  Source(Box<dyn FnMut() -> BoxedValue + Send>),
}

pub struct Pipeline {
  stages: Vec<Stage>,
  /// Type of the value the last pushed stage leaves behind.
  output: Option<(TypeId, &'static str)>,
}

impl Pipeline {
  pub fn new() -> Pipeline {
    Pipeline {
      stages: Vec::new(),
      output: None,
    }
  }

  /// Appends a stage that consumes the previous stage's result. Fails
  /// right here when the declared input does not match what the pipeline
  /// currently produces.
  pub fn push<In, Out, F>(&mut self, mut f: F) -> Result<&mut Self, Error>
  where
    In: Any + Send,
    Out: Any + Send,
    F: FnMut(In) -> Out + Send + 'static,
  {
    match self.output {
      None => {
        return Err(Error::TypeMismatch {
          expected: type_name::<In>(),
          found: "nothing",
        })
      }
      Some((id, found)) if id != TypeId::of::<In>() => {
        return Err(Error::TypeMismatch {
          expected: type_name::<In>(),
          found,
        })
      }
      Some(_) => {}
    }
    self.stages.push(Stage::Feed(Box::new(move |value| {
      let value = value
        .downcast::<In>()
        .expect("stage input was checked at push time");
      Box::new(f(*value))
    })));
    self.output = Some((TypeId::of::<Out>(), type_name::<Out>()));
    Ok(self)
  }

  /// Appends a stage that takes no input. Any previous result is
  /// dropped, so a source is welcome anywhere in the pipeline.
  pub fn push_source<Out, F>(&mut self, mut f: F) -> &mut Self
  where
    Out: Any + Send,
    F: FnMut() -> Out + Send + 'static,
  {
    self
      .stages
      .push(Stage::Source(Box::new(move || Box::new(f()))));
    self.output = Some((TypeId::of::<Out>(), type_name::<Out>()));
    self
  }

  pub fn len(&self) -> usize {
    self.stages.len()
  }

  pub fn is_empty(&self) -> bool {
    self.stages.is_empty()
  }

  /// Runs every stage in order and returns the last stage's value, or
  /// `None` for an empty pipeline.
  pub fn run(&mut self) -> Option<BoxedValue> {
    let mut value: Option<BoxedValue> = None;
    for stage in &mut self.stages {
      value = Some(match stage {
        Stage::Feed(f) => f(value.take().expect("feed stages follow a producer")),
        Stage::Source(f) => f(),
      });
    }
    value
  }
}

impl Default for Pipeline {
  fn default() -> Self {
    Pipeline::new()
  }
}

impl Invoke for Pipeline {
  type Output = Option<BoxedValue>;

  fn invoke(&mut self) -> Self::Output {
    self.run()
  }
}

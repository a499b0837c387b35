use std::collections::{HashMap, HashSet};
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use crate::bean::BeanRef;
use crate::codec::files::location_bytes;
use crate::codec::{CodecRegistry, EncodeError, Value, tags};
use crate::error::{CacheError, ContractViolation};
use crate::isolate::{ActiveIsolate, IsolateKey};
use crate::problems::{Problem, ProblemCollector, ProblemKind, PropertyTrace, TraceFrame};
use crate::stream::Encoder;
use crate::trace::Tracer;

/// A write session over one segment.
pub struct WriteContext<'a> {
  encoder: Encoder<Box<dyn Write + 'a>>,
  codecs: Arc<CodecRegistry>,
  profile: String,
  isolates: Vec<ActiveIsolate>,
  problems: ProblemCollector,
  trace: PropertyTrace,
  tracer: Option<Box<dyn Tracer + 'a>>,
  beans: HashMap<usize, (u32, BeanRef)>,
  constructing: HashSet<usize>,
  types: HashMap<(IsolateKey, String), u32>,
}

impl<'a> WriteContext<'a> {
  pub fn new<W: Write + 'a>(sink: W, codecs: Arc<CodecRegistry>, profile: impl Into<String>) -> Self {
    Self {
      encoder: Encoder::new(Box::new(sink)),
      codecs,
      profile: profile.into(),
      isolates: Vec::new(),
      problems: ProblemCollector::new(),
      trace: PropertyTrace::new(),
      tracer: None,
      beans: HashMap::new(),
      constructing: HashSet::new(),
      types: HashMap::new(),
    }
  }

  /// Install (or remove) the tracer notified of frame boundaries.
  pub fn set_tracer(&mut self, tracer: Option<Box<dyn Tracer + 'a>>) {
    self.tracer = tracer;
  }

  pub fn has_tracer(&self) -> bool {
    self.tracer.is_some()
  }

  /// Label of the segment being written, used in logs and problem reports.
  pub fn profile(&self) -> &str {
    &self.profile
  }

  pub fn position(&self) -> u64 {
    self.encoder.position()
  }

  pub fn codecs(&self) -> &Arc<CodecRegistry> {
    &self.codecs
  }

  pub fn encoder(&mut self) -> &mut Encoder<Box<dyn Write + 'a>> {
    &mut self.encoder
  }

  pub fn problems(&self) -> &[Problem] {
    self.problems.problems()
  }

  pub fn trace(&self) -> &PropertyTrace {
    &self.trace
  }

  pub fn active_isolate(&self) -> Option<&ActiveIsolate> {
    self.isolates.last()
  }

  /// Write any value through the codec registry.
  ///
  /// A value no family can encode is replaced by a sentinel and recorded as
  /// a problem; only fatal errors are returned.
  pub fn write(&mut self, value: &Value) -> Result<(), CacheError> {
    if let Value::Missing(missing) = value {
      return self.write_sentinel(missing.type_name.as_deref(), &missing.reason);
    }

    let codecs = self.codecs.clone();
    let outcome = match codecs.resolve(value) {
      Some(family) => family.encode(self, value),
      None => Err(EncodeError::Unserializable(format!(
        "no codec accepts values of type `{}`",
        value.type_name()
      ))),
    };

    match outcome {
      Ok(()) => Ok(()),
      Err(EncodeError::Unserializable(cause)) => {
        let type_name = value.type_name();
        self.record(Problem::new(ProblemKind::Unserializable, cause.clone()).with_type(type_name.clone()));
        self.write_sentinel(Some(&type_name), &cause)
      }
      Err(EncodeError::Fatal(error)) => Err(error),
    }
  }

  fn write_sentinel(&mut self, type_name: Option<&str>, cause: &str) -> Result<(), CacheError> {
    self.encoder.write_u8(tags::UNAVAILABLE)?;
    self.encoder.write_bool(type_name.is_some())?;
    if let Some(type_name) = type_name {
      self.encoder.write_str(type_name)?;
    }
    self.encoder.write_str(cause)?;
    Ok(())
  }

  /// Record a problem at the current property trace.
  pub fn record(&mut self, problem: Problem) {
    let problem = problem.at(&self.trace);
    self.problems.record(problem);
  }

  /// Run `body` inside isolate `key`, restoring the previous isolate after.
  pub fn with_isolate<T>(
    &mut self,
    key: &IsolateKey,
    body: impl FnOnce(&mut Self) -> Result<T, CacheError>,
  ) -> Result<T, CacheError> {
    let types = self
      .codecs
      .collaborators()
      .isolates
      .get(key)
      .ok_or_else(|| ContractViolation::UnknownIsolate {
        isolate: key.to_string(),
      })?;
    self.encoder.write_str(key.as_str())?;

    self.isolates.push(ActiveIsolate {
      key: key.clone(),
      types,
    });
    let result = body(self);
    self.isolates.pop();
    result
  }

  /// Run `body` inside a property trace frame, reporting it to the tracer.
  pub fn frame<T, E>(&mut self, frame: TraceFrame, body: impl FnOnce(&mut Self) -> Result<T, E>) -> Result<T, E> {
    self.trace.push(frame);
    if let Some(tracer) = self.tracer.as_mut() {
      tracer.open(&self.trace, self.encoder.position());
    }
    let result = body(self);
    if let Some(tracer) = self.tracer.as_mut() {
      tracer.close(&self.trace, self.encoder.position());
    }
    self.trace.pop();
    result
  }

  pub fn write_str(&mut self, value: &str) -> Result<(), CacheError> {
    Ok(self.encoder.write_str(value)?)
  }

  pub fn write_len(&mut self, len: usize) -> Result<(), CacheError> {
    Ok(self.encoder.write_len(len)?)
  }

  pub fn write_bool(&mut self, value: bool) -> Result<(), CacheError> {
    Ok(self.encoder.write_bool(value)?)
  }

  /// Write a file location directly, without a tag.
  ///
  /// The location is stored byte for byte; one this platform cannot store
  /// losslessly is an error rather than a rewritten path.
  pub fn write_file(&mut self, path: &Path) -> Result<(), CacheError> {
    let bytes = location_bytes(path).ok_or_else(|| CacheError::UnsupportedPath(path.to_path_buf()))?;
    Ok(self.encoder.write_bytes(bytes)?)
  }

  /// Write a length-prefixed sequence, one `write_item` call per element.
  pub fn write_collection<T>(
    &mut self,
    items: &[T],
    mut write_item: impl FnMut(&mut Self, &T) -> Result<(), CacheError>,
  ) -> Result<(), CacheError> {
    self.write_len(items.len())?;
    for item in items {
      write_item(self, item)?;
    }
    Ok(())
  }

  pub(crate) fn bean_id(&self, bean: &BeanRef) -> Option<u32> {
    self.beans.get(&bean.addr()).map(|(id, _)| *id)
  }

  /// Give `bean` the next id; later occurrences are written as references.
  pub(crate) fn assign_bean_id(&mut self, bean: &BeanRef) -> u32 {
    let id = self.beans.len() as u32;
    self.beans.insert(bean.addr(), (id, bean.clone()));
    id
  }

  pub(crate) fn is_constructing(&self, bean: &BeanRef) -> bool {
    self.constructing.contains(&bean.addr())
  }

  pub(crate) fn begin_construction(&mut self, bean: &BeanRef) {
    self.constructing.insert(bean.addr());
  }

  pub(crate) fn end_construction(&mut self, bean: &BeanRef) {
    self.constructing.remove(&bean.addr());
  }

  /// Write an interned `(isolate, type)` reference.
  pub(crate) fn write_type_ref(&mut self, isolate: &IsolateKey, type_name: &str) -> Result<(), CacheError> {
    let key = (isolate.clone(), type_name.to_string());
    if let Some(&index) = self.types.get(&key) {
      return self.encoder.write_var_u64(u64::from(index)).map_err(Into::into);
    }
    let index = self.types.len() as u32;
    self.encoder.write_var_u64(u64::from(index))?;
    self.encoder.write_str(isolate.as_str())?;
    self.encoder.write_str(type_name)?;
    self.types.insert(key, index);
    Ok(())
  }

  /// Take the problems recorded so far.
  pub fn take_problems(&mut self) -> Vec<Problem> {
    self.problems.take()
  }

  pub fn flush(&mut self) -> Result<(), CacheError> {
    Ok(self.encoder.flush()?)
  }

  /// Flush the stream and hand back the recorded problems.
  pub fn finish(mut self) -> Result<Vec<Problem>, CacheError> {
    self.flush()?;
    Ok(self.problems.take())
  }
}

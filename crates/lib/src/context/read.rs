use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;

use crate::codec::files::location_from_bytes;
use crate::codec::{CodecRegistry, MissingValue, Value, tags};
use crate::error::{CacheError, ContractViolation};
use crate::isolate::{ActiveIsolate, IsolateKey};
use crate::problems::{Problem, ProblemCollector, ProblemKind, PropertyTrace, TraceFrame};
use crate::stream::{Decoder, StreamError};

/// A read session over one segment.
pub struct ReadContext<'a> {
  decoder: Decoder<Box<dyn Read + 'a>>,
  codecs: Arc<CodecRegistry>,
  profile: String,
  isolates: Vec<ActiveIsolate>,
  problems: ProblemCollector,
  trace: PropertyTrace,
  beans: Vec<Value>,
  types: Vec<(IsolateKey, String)>,
}

impl<'a> ReadContext<'a> {
  pub fn new<R: Read + 'a>(source: R, codecs: Arc<CodecRegistry>, profile: impl Into<String>) -> Self {
    Self {
      decoder: Decoder::new(Box::new(source)),
      codecs,
      profile: profile.into(),
      isolates: Vec::new(),
      problems: ProblemCollector::new(),
      trace: PropertyTrace::new(),
      beans: Vec::new(),
      types: Vec::new(),
    }
  }

  pub fn profile(&self) -> &str {
    &self.profile
  }

  pub fn position(&self) -> u64 {
    self.decoder.position()
  }

  pub fn codecs(&self) -> &Arc<CodecRegistry> {
    &self.codecs
  }

  pub fn decoder(&mut self) -> &mut Decoder<Box<dyn Read + 'a>> {
    &mut self.decoder
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

  /// Read the next value, dispatching on its tag.
  ///
  /// A sentinel yields [`Value::Missing`] and records a problem.
  pub fn read(&mut self) -> Result<Value, CacheError> {
    let position = self.decoder.position();
    let tag = self.decoder.read_u8()?;
    if tag == tags::UNAVAILABLE {
      return self.read_sentinel();
    }

    let codecs = self.codecs.clone();
    let family = codecs
      .family_for_tag(tag)
      .ok_or(ContractViolation::UnknownTag { tag, position })?;
    family.decode(self, tag)
  }

  fn read_sentinel(&mut self) -> Result<Value, CacheError> {
    let type_name = if self.decoder.read_bool()? {
      Some(self.decoder.read_str()?)
    } else {
      None
    };
    let reason = self.decoder.read_str()?;

    let mut problem = Problem::new(ProblemKind::Unavailable, reason.clone());
    if let Some(type_name) = &type_name {
      problem = problem.with_type(type_name.clone());
    }
    self.record(problem);
    Ok(Value::Missing(MissingValue { type_name, reason }))
  }

  /// Record a problem at the current property trace.
  pub fn record(&mut self, problem: Problem) {
    let problem = problem.at(&self.trace);
    self.problems.record(problem);
  }

  /// Run `body` inside isolate `key`.
  ///
  /// The isolate recorded in the stream must be `key`; anything else is an
  /// [`IsolateMismatch`](ContractViolation::IsolateMismatch).
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
    let recorded = self.decoder.read_str()?;
    if recorded != key.as_str() {
      return Err(
        ContractViolation::IsolateMismatch {
          expected: key.to_string(),
          found: recorded,
        }
        .into(),
      );
    }

    self.isolates.push(ActiveIsolate {
      key: key.clone(),
      types,
    });
    let result = body(self);
    self.isolates.pop();
    result
  }

  /// Run `body` inside a property trace frame.
  pub fn frame<T, E>(&mut self, frame: TraceFrame, body: impl FnOnce(&mut Self) -> Result<T, E>) -> Result<T, E> {
    self.trace.push(frame);
    let result = body(self);
    self.trace.pop();
    result
  }

  pub fn read_str(&mut self) -> Result<String, CacheError> {
    Ok(self.decoder.read_str()?)
  }

  pub fn read_len(&mut self) -> Result<usize, CacheError> {
    Ok(self.decoder.read_len()?)
  }

  pub fn read_bool(&mut self) -> Result<bool, CacheError> {
    Ok(self.decoder.read_bool()?)
  }

  /// Read a file location written by [`WriteContext::write_file`](super::WriteContext::write_file).
  pub fn read_file(&mut self) -> Result<PathBuf, CacheError> {
    let bytes = self.decoder.read_bytes()?;
    let Some(recorded) = location_from_bytes(bytes) else {
      return Err(self.corrupt("file location is not valid on this platform"));
    };
    let files = self.codecs.collaborators().files.clone();
    Ok(files.resolve(&recorded))
  }

  /// Read a length-prefixed sequence, one `read_item` call per element.
  pub fn read_list<T>(&mut self, mut read_item: impl FnMut(&mut Self) -> Result<T, CacheError>) -> Result<Vec<T>, CacheError> {
    let len = self.read_len()?;
    let mut items = Vec::with_capacity(len.min(1024));
    for _ in 0..len {
      items.push(read_item(self)?);
    }
    Ok(items)
  }

  /// Remember the value for bean id `self.beans.len()`.
  pub(crate) fn register_bean(&mut self, value: Value) -> u64 {
    self.beans.push(value);
    (self.beans.len() - 1) as u64
  }

  pub(crate) fn bean(&self, id: u64) -> Option<Value> {
    usize::try_from(id).ok().and_then(|id| self.beans.get(id)).cloned()
  }

  /// Read an interned `(isolate, type)` reference.
  pub(crate) fn read_type_ref(&mut self) -> Result<(IsolateKey, String), CacheError> {
    let index = self.decoder.read_var_u64()?;
    let known = self.types.len() as u64;
    if index < known {
      return Ok(self.types[index as usize].clone());
    }
    if index > known {
      return Err(ContractViolation::UnknownTypeReference { index }.into());
    }
    let isolate = IsolateKey::new(self.decoder.read_str()?);
    let type_name = self.decoder.read_str()?;
    self.types.push((isolate.clone(), type_name.clone()));
    Ok((isolate, type_name))
  }

  /// Error for a tag a family was handed but does not understand.
  pub(crate) fn unknown_tag(&self, tag: u8) -> CacheError {
    ContractViolation::UnknownTag {
      tag,
      position: self.decoder.position().saturating_sub(1),
    }
    .into()
  }

  pub(crate) fn corrupt(&self, message: impl Into<String>) -> CacheError {
    StreamError::Corrupt {
      position: self.decoder.position(),
      message: message.into(),
    }
    .into()
  }

  pub fn take_problems(&mut self) -> Vec<Problem> {
    self.problems.take()
  }
}

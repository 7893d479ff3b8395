use std::collections::HashMap;

use arbor_json_rpc::{Fixup, PathComponent, RequestId, RpcResult};
use serde_json::Value;

use crate::error::{MarshalError, MarshalResult, UnmarshalError, UnmarshalResult};
use crate::value::{HostValue, Identity};

/// How marshalled output encodes shared and cyclic structure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FixupPolicy {
    /// No fixups at all: duplicates are re-serialized by value and a cycle
    /// is a fatal marshalling error.
    None,
    /// Non-ancestor duplicates become fixups; cycles are still fatal.
    DuplicatesOnly,
    /// Both circular references and duplicates become fixups.
    CircularAndDuplicates,
}

/// Output shape of a marshalling pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Fixups(FixupPolicy),
    /// Every complex object is hoisted to a top-level `_n` key and each
    /// occurrence in the tree is the token string `_n`.
    Flat,
}

impl Default for OutputMode {
    fn default() -> Self {
        OutputMode::Fixups(FixupPolicy::CircularAndDuplicates)
    }
}

/// Per-instance record of a value met during marshalling: where it was
/// first emitted and, once finished, its serialized form.
struct ProcessedObject {
    location: Vec<PathComponent>,
    serialized: Option<Value>,
    flat_index: Option<String>,
}

/// What the façade should do after announcing a value to the state.
#[derive(Debug)]
pub enum Visit {
    /// First encounter: serialize the value, then call [`SerializerState::exit`].
    Fresh,
    /// The value was already emitted; put this JSON in the current slot and
    /// do not descend.
    Reuse(Value),
}

/// Per-invocation scratchpad for one marshal or unmarshal pass.
///
/// Marshal side: an identity-keyed record table, the location stack of the
/// current descent and the accumulated fixups (or flat records). Unmarshal
/// side: the alias table handed over by the request parser plus the values
/// already constructed per canonical path. A state is confined to one call
/// and never reused.
pub struct SerializerState {
    mode: OutputMode,
    processed: HashMap<Identity, ProcessedObject>,
    stack: Vec<PathComponent>,
    descent: Vec<Identity>,
    fixups: Vec<Fixup>,
    flat_order: Vec<Identity>,
    aliases: HashMap<Vec<PathComponent>, Vec<PathComponent>>,
    constructed: HashMap<Vec<PathComponent>, HostValue>,
}

impl SerializerState {
    pub fn new(mode: OutputMode) -> Self {
        Self {
            mode,
            processed: HashMap::new(),
            stack: Vec::new(),
            descent: Vec::new(),
            fixups: Vec::new(),
            flat_order: Vec::new(),
            aliases: HashMap::new(),
            constructed: HashMap::new(),
        }
    }

    pub fn mode(&self) -> OutputMode {
        self.mode
    }

    /// Current descent path (marshal and unmarshal share the stack).
    pub fn current_path(&self) -> &[PathComponent] {
        &self.stack
    }

    /// Pushes an intermediate path component (a wrapper key such as
    /// `"list"`, or an element position during unmarshalling).
    pub fn push_component(&mut self, component: PathComponent) {
        self.stack.push(normalize(component));
    }

    pub fn pop_component(&mut self) {
        self.stack.pop();
    }

    // ----- marshal side ---------------------------------------------------

    /// Announces `value` about to be emitted in the slot `component`.
    ///
    /// For identityless scalars this just pushes the component. For tracked
    /// values it detects repeats: an ancestor repeat is a circular
    /// reference, any other repeat a duplicate, and the installed policy
    /// decides between a fixup, a re-serialization, or failure. On
    /// [`Visit::Fresh`] the caller must serialize and then call [`exit`].
    ///
    /// [`exit`]: SerializerState::exit
    pub fn enter(
        &mut self,
        identity: Option<Identity>,
        component: PathComponent,
    ) -> MarshalResult<Visit> {
        let component = normalize(component);
        let id = match identity {
            None => {
                // scalars are never tracked
                self.stack.push(component);
                self.descent.push(0);
                return Ok(Visit::Fresh);
            }
            Some(id) => id,
        };

        if let Some(existing) = self.processed.get(&id) {
            match self.mode {
                OutputMode::Flat => {
                    let token = existing
                        .flat_index
                        .clone()
                        .expect("flat record always carries an index");
                    return Ok(Visit::Reuse(Value::String(token)));
                }
                OutputMode::Fixups(policy) => {
                    let circular = self.descent.contains(&id);
                    let fix_up = match (circular, policy) {
                        (true, FixupPolicy::CircularAndDuplicates) => true,
                        (true, _) => return Err(MarshalError::CircularReference),
                        (false, FixupPolicy::None) => false,
                        (false, _) => true,
                    };
                    if fix_up {
                        let mut location = self.stack.clone();
                        location.push(component);
                        self.fixups.push(Fixup::new(location, existing.location.clone()));
                        return Ok(Visit::Reuse(Value::Null));
                    }
                    // duplicate under FixupPolicy::None: serialize it again
                    // by value, leaving the first record untouched
                }
            }
        } else {
            let mut location = self.stack.clone();
            location.push(component.clone());
            let flat_index = match self.mode {
                OutputMode::Flat => {
                    self.flat_order.push(id);
                    Some(format!("_{}", self.flat_order.len()))
                }
                OutputMode::Fixups(_) => None,
            };
            self.processed.insert(
                id,
                ProcessedObject {
                    location,
                    serialized: None,
                    flat_index,
                },
            );
        }

        self.stack.push(component);
        self.descent.push(id);
        Ok(Visit::Fresh)
    }

    /// Closes the frame opened by [`enter`](SerializerState::enter) and
    /// records the finished JSON. Returns what the parent slot should
    /// contain: the JSON itself, or the index token in flat mode.
    pub fn exit(&mut self, identity: Option<Identity>, serialized: Value) -> Value {
        self.stack.pop();
        self.descent.pop();
        if let Some(id) = identity {
            if let Some(record) = self.processed.get_mut(&id) {
                if record.serialized.is_none() {
                    record.serialized = Some(serialized.clone());
                }
                if let Some(token) = &record.flat_index {
                    return Value::String(token.clone());
                }
            }
        }
        serialized
    }

    /// Fixups accumulated so far, in descent order.
    pub fn fixups(&self) -> &[Fixup] {
        &self.fixups
    }

    /// Drains the flat records in index order as `("_n", json)` pairs.
    fn flat_objects(&mut self) -> Vec<(String, Value)> {
        let mut objects = Vec::with_capacity(self.flat_order.len());
        for id in &self.flat_order {
            if let Some(record) = self.processed.get(id) {
                let token = record
                    .flat_index
                    .clone()
                    .expect("flat record always carries an index");
                let json = record.serialized.clone().unwrap_or(Value::Null);
                objects.push((token, json));
            }
        }
        objects
    }

    /// Wraps a finished marshal pass into the response shape the installed
    /// output mode calls for.
    pub fn into_result(mut self, id: Option<RequestId>, result: Value) -> RpcResult {
        match self.mode {
            OutputMode::Fixups(_) => RpcResult::with_fixups(id, result, std::mem::take(&mut self.fixups)),
            OutputMode::Flat => {
                let objects = self.flat_objects();
                RpcResult::flat(id, result, objects)
            }
        }
    }

    // ----- unmarshal side -------------------------------------------------

    /// Installs the alias table produced by the request parser: each entry
    /// maps a (target) path to the canonical path whose value it shares.
    pub fn install_aliases(&mut self, aliases: Vec<(Vec<PathComponent>, Vec<PathComponent>)>) {
        for (target, source) in aliases {
            self.aliases.insert(
                target.into_iter().map(normalize).collect(),
                source.into_iter().map(normalize).collect(),
            );
        }
    }

    pub fn has_aliases(&self) -> bool {
        !self.aliases.is_empty()
    }

    /// If the current path is an alias target, returns the value already
    /// constructed at its source. An alias whose source has not been
    /// visited is invalid fixup data.
    pub fn aliased_value(&self) -> UnmarshalResult<Option<HostValue>> {
        match self.aliases.get(&self.stack) {
            None => Ok(None),
            Some(source) => match self.constructed.get(source) {
                Some(value) => Ok(Some(value.clone())),
                None => Err(UnmarshalError::BadFixups(format!(
                    "fixup source {} was never materialized",
                    display_path(source)
                ))),
            },
        }
    }

    /// Whether the current path is an alias target at all (used by trial
    /// unmarshalling, which must not construct anything).
    pub fn is_alias_target(&self) -> bool {
        self.aliases.contains_key(&self.stack)
    }

    /// Registers the (possibly still unpopulated) value constructed at the
    /// current path, so later alias targets and back-references can share
    /// it.
    pub fn record_constructed(&mut self, value: &HostValue) {
        self.constructed.insert(self.stack.clone(), value.clone());
    }
}

fn normalize(component: PathComponent) -> PathComponent {
    match component {
        PathComponent::BucketKey(key) => PathComponent::Field(key),
        other => other,
    }
}

fn display_path(path: &[PathComponent]) -> String {
    path.iter().map(|c| c.to_string()).collect::<Vec<_>>().join("")
}

use crate::capability::{Capability, CapabilityRegistry};
use crate::error::CodecError;
use crate::ids::{LocalId, ServerId};
use crate::sync::{ComponentJson, ComponentSync};

/// A capability instance owned by at most one game object.
///
/// The owner is recorded by id only; the game object holds the component,
/// never the other way round.
#[derive(Debug)]
pub struct Component {
    local_id: LocalId,
    server_id: Option<ServerId>,
    game_object: Option<LocalId>,
    /// Include in full snapshots.
    pub json: bool,
    /// Include in per-tick deltas.
    pub sync: bool,
    state: Box<dyn Capability>,
}

impl Component {
    pub fn new(state: Box<dyn Capability>) -> Self {
        Self {
            local_id: LocalId::next(),
            server_id: None,
            game_object: None,
            json: true,
            sync: true,
            state,
        }
    }

    pub fn from_capability<C: Capability>(capability: C) -> Self {
        Self::new(Box::new(capability))
    }

    /// Builds a component from a registered tag, or `None` if the tag is unknown.
    pub fn from_kind(registry: &CapabilityRegistry, kind: &str) -> Option<Self> {
        registry.create(kind).map(Self::new)
    }

    pub fn with_server_id(mut self, server_id: ServerId) -> Self {
        self.server_id = Some(server_id);
        self
    }

    pub fn kind(&self) -> &'static str {
        self.state.kind()
    }

    pub fn local_id(&self) -> LocalId {
        self.local_id
    }

    pub fn server_id(&self) -> Option<ServerId> {
        self.server_id
    }

    /// Owning game object, if attached.
    pub fn game_object(&self) -> Option<LocalId> {
        self.game_object
    }

    pub(crate) fn attach(&mut self, owner: LocalId) {
        self.game_object = Some(owner);
    }

    pub(crate) fn detach(&mut self) {
        self.game_object = None;
    }

    pub fn capability(&self) -> &dyn Capability {
        self.state.as_ref()
    }

    pub fn capability_mut(&mut self) -> &mut dyn Capability {
        self.state.as_mut()
    }

    pub fn get<C: Capability>(&self) -> Option<&C> {
        self.state.as_any().downcast_ref::<C>()
    }

    pub fn get_mut<C: Capability>(&mut self) -> Option<&mut C> {
        self.state.as_any_mut().downcast_mut::<C>()
    }

    /// Deep copy with a fresh local id, no server id and no owner.
    pub fn clone_detached(&self) -> Self {
        Self {
            local_id: LocalId::next(),
            server_id: None,
            game_object: None,
            json: self.json,
            sync: self.sync,
            state: self.state.clone_box(),
        }
    }

    pub fn to_json(&self) -> Result<ComponentJson, CodecError> {
        Ok(ComponentJson {
            id: self.server_id,
            kind: self.kind().to_string(),
            json: self.json,
            sync: self.sync,
            data: self.state.to_json()?,
        })
    }

    /// Constructs a component from a snapshot entry. Returns `Ok(None)` when
    /// the tag is not registered.
    pub fn from_json(registry: &CapabilityRegistry, json: &ComponentJson) -> Result<Option<Self>, CodecError> {
        let Some(mut component) = Self::from_kind(registry, &json.kind) else {
            return Ok(None);
        };
        component.server_id = json.id;
        component.apply_json(json)?;
        Ok(Some(component))
    }

    /// Updates state in place from a snapshot entry; identity is untouched.
    pub fn apply_json(&mut self, json: &ComponentJson) -> Result<(), CodecError> {
        self.json = json.json;
        self.sync = json.sync;
        if json.data.is_null() {
            return Ok(());
        }
        self.state.from_json(&json.data)
    }

    pub fn to_sync(&self) -> ComponentSync {
        let mut fields = Vec::new();
        self.state.to_sync(&mut fields);
        ComponentSync {
            id: self.server_id,
            kind: self.kind().to_string(),
            fields,
        }
    }

    /// Constructs a component from a delta entry. Returns `Ok(None)` when the
    /// tag is not registered.
    pub fn from_sync(registry: &CapabilityRegistry, sync: &ComponentSync) -> Result<Option<Self>, CodecError> {
        let Some(mut component) = Self::from_kind(registry, &sync.kind) else {
            return Ok(None);
        };
        component.server_id = sync.id;
        component.apply_sync(sync)?;
        Ok(Some(component))
    }

    pub fn apply_sync(&mut self, sync: &ComponentSync) -> Result<(), CodecError> {
        self.state.from_sync(&sync.fields)
    }
}

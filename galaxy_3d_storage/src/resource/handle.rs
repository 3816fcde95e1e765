/// Resource handles.
///
/// Every resource lives behind a `Rid`, a versioned slot-map key allocated
/// from a single registry. The registry records which kind of resource a
/// `Rid` names, so generic entry points (`free`, `get_base_type`,
/// `instance_add_dependency`) can work without knowing the concrete kind.
///
/// Typed wrappers (`TextureHandle`, `MeshHandle`, ...) are what the typed
/// APIs accept. They convert into `Rid` for free, never the other way round.

use slotmap::{new_key_type, Key, SlotMap};

// ===== SLOT MAP KEYS =====

new_key_type! {
    /// Untyped resource identifier.
    ///
    /// A freed `Rid` never resolves again, even if its slot is reused:
    /// the slot version is bumped on removal.
    pub struct Rid;
}

new_key_type! {
    /// Key of an externally owned instance registered with the storage layer
    pub struct InstanceKey;
}

// ===== BASE TYPE =====

/// Resource kind a `Rid` refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BaseType {
    Texture,
    Shader,
    Material,
    Mesh,
    Light,
    RenderTarget,
    CanvasOccluder,
    CanvasLightShadow,
}

impl BaseType {
    /// Whether instances can depend on resources of this kind
    pub fn is_instantiable(&self) -> bool {
        matches!(self, BaseType::Mesh | BaseType::Light)
    }
}

// ===== TYPED HANDLES =====

macro_rules! typed_handle {
    ($(#[$meta:meta])* $name:ident => $kind:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
        pub struct $name(Rid);

        impl $name {
            /// Resource kind named by this handle type
            pub const BASE_TYPE: BaseType = BaseType::$kind;

            /// The null handle (never valid)
            pub fn null() -> Self {
                Self(Rid::null())
            }

            /// Whether this is the null handle
            pub fn is_null(&self) -> bool {
                self.0.is_null()
            }

            /// Untyped identifier
            pub fn rid(&self) -> Rid {
                self.0
            }

            pub(crate) fn from_rid(rid: Rid) -> Self {
                Self(rid)
            }
        }

        impl From<$name> for Rid {
            fn from(handle: $name) -> Rid {
                handle.0
            }
        }
    };
}

typed_handle!(
    /// Handle to a texture
    TextureHandle => Texture
);
typed_handle!(
    /// Handle to a shader
    ShaderHandle => Shader
);
typed_handle!(
    /// Handle to a material
    MaterialHandle => Material
);
typed_handle!(
    /// Handle to a mesh
    MeshHandle => Mesh
);
typed_handle!(
    /// Handle to a light
    LightHandle => Light
);
typed_handle!(
    /// Handle to a render target
    RenderTargetHandle => RenderTarget
);
typed_handle!(
    /// Handle to a 2D light occluder
    OccluderHandle => CanvasOccluder
);
typed_handle!(
    /// Handle to a 2D light shadow buffer
    LightShadowHandle => CanvasLightShadow
);

// ===== REGISTRY =====

/// Maps every live `Rid` to its resource kind.
///
/// The per-kind tables own the resource objects; this registry only owns
/// identity. A `Rid` is registered after its resource is fully built and
/// unregistered last during a free, so no half-built resource is ever
/// reachable through it.
pub struct HandleRegistry {
    kinds: SlotMap<Rid, BaseType>,
}

impl HandleRegistry {
    pub fn new() -> Self {
        Self {
            kinds: SlotMap::with_key(),
        }
    }

    /// Allocate a fresh `Rid` for a resource of the given kind
    pub fn allocate(&mut self, kind: BaseType) -> Rid {
        self.kinds.insert(kind)
    }

    /// Release a `Rid`. Returns the kind it named, if it was live.
    pub fn release(&mut self, rid: Rid) -> Option<BaseType> {
        self.kinds.remove(rid)
    }

    /// Kind of a live `Rid`
    pub fn kind(&self, rid: Rid) -> Option<BaseType> {
        self.kinds.get(rid).copied()
    }

    /// Whether `rid` is live and of the given kind
    pub fn is(&self, rid: Rid, kind: BaseType) -> bool {
        self.kind(rid) == Some(kind)
    }

    /// Number of live resources, all kinds
    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }
}

impl Default for HandleRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "handle_tests.rs"]
mod tests;

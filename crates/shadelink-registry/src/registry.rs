//! Registry - the process-wide catalog of profiles and target formats.
//!
//! # Thread Safety
//!
//! A [`Registry`] is immutable once constructed, so it is `Sync` and can be
//! shared by any number of sessions on any number of threads. The global
//! instance is built on first use and lives for the rest of the process.
//!
//! # Example
//!
//! ```
//! use shadelink_registry::{Registry, TargetDesc, TargetFormat};
//!
//! let registry = Registry::global();
//! let spirv = registry.find_profile("spirv_1_6").unwrap();
//! assert_eq!(registry.profile(spirv).unwrap().name, "spirv_1_6");
//!
//! let target = registry
//!     .resolve_target(&TargetDesc::new(TargetFormat::Spirv, "spirv_1_6"))
//!     .unwrap();
//! assert_eq!(target.profile, spirv);
//! ```

use std::sync::OnceLock;

use rustc_hash::FxHashMap;
use shadelink_core::ConfigError;

use crate::profile::BUILTIN_PROFILES;
use crate::{Profile, ProfileFamily, ProfileId, ResolvedTarget, TargetCaps, TargetDesc, TargetFormat};

/// Immutable catalog of supported profiles and target capabilities.
#[derive(Debug)]
pub struct Registry {
    profiles: Vec<Profile>,
    profiles_by_name: FxHashMap<&'static str, ProfileId>,
    capabilities: FxHashMap<TargetFormat, TargetCaps>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    /// Build a registry holding the built-in catalog.
    pub fn new() -> Self {
        let profiles: Vec<Profile> = BUILTIN_PROFILES
            .iter()
            .enumerate()
            .map(|(i, (name, family, version))| Profile {
                id: ProfileId::new(i as u32),
                name: *name,
                family: *family,
                version: *version,
            })
            .collect();
        let profiles_by_name = profiles.iter().map(|p| (p.name, p.id)).collect();

        let capabilities = TargetFormat::ALL
            .into_iter()
            .map(|format| (format, Self::builtin_caps(format)))
            .collect();

        Self {
            profiles,
            profiles_by_name,
            capabilities,
        }
    }

    /// The process-wide registry.
    pub fn global() -> &'static Registry {
        static GLOBAL: OnceLock<Registry> = OnceLock::new();
        GLOBAL.get_or_init(Registry::new)
    }

    fn builtin_caps(format: TargetFormat) -> TargetCaps {
        match format {
            TargetFormat::Spirv => {
                TargetCaps::DESCRIPTOR_SETS
                    | TargetCaps::DIRECT_SPIRV
                    | TargetCaps::WHOLE_PROGRAM
                    | TargetCaps::BINARY
            }
            TargetFormat::SpirvAsm => {
                TargetCaps::DESCRIPTOR_SETS | TargetCaps::DIRECT_SPIRV | TargetCaps::WHOLE_PROGRAM
            }
            TargetFormat::Glsl | TargetFormat::Wgsl => TargetCaps::DESCRIPTOR_SETS,
            TargetFormat::Hlsl => TargetCaps::REGISTER_CLASSES,
            TargetFormat::Dxil => {
                TargetCaps::REGISTER_CLASSES | TargetCaps::WHOLE_PROGRAM | TargetCaps::BINARY
            }
            TargetFormat::Dxbc => TargetCaps::REGISTER_CLASSES | TargetCaps::BINARY,
            TargetFormat::Metal => TargetCaps::REGISTER_CLASSES,
        }
    }

    /// Find a profile by name.
    pub fn find_profile(&self, name: &str) -> Option<ProfileId> {
        self.profiles_by_name.get(name).copied()
    }

    /// Get a profile by id.
    pub fn profile(&self, id: ProfileId) -> Option<&Profile> {
        self.profiles.get(id.index() as usize)
    }

    /// Iterate over every known profile.
    pub fn profiles(&self) -> impl Iterator<Item = &Profile> {
        self.profiles.iter()
    }

    /// Capabilities of a target format.
    pub fn capabilities(&self, format: TargetFormat) -> TargetCaps {
        self.capabilities.get(&format).copied().unwrap_or_default()
    }

    /// Whether `profile` can be used to compile for `format`.
    pub fn accepts(&self, format: TargetFormat, profile: &Profile) -> bool {
        match format {
            TargetFormat::Spirv | TargetFormat::SpirvAsm => {
                matches!(profile.family, ProfileFamily::Spirv | ProfileFamily::Glsl)
            }
            TargetFormat::Glsl => profile.family == ProfileFamily::Glsl,
            TargetFormat::Hlsl => profile.family == ProfileFamily::Hlsl,
            TargetFormat::Dxil => profile.family == ProfileFamily::Hlsl && profile.version.0 >= 6,
            TargetFormat::Dxbc => profile.family == ProfileFamily::Hlsl && profile.version.0 < 6,
            TargetFormat::Metal => profile.family == ProfileFamily::Metal,
            TargetFormat::Wgsl => profile.family == ProfileFamily::Wgsl,
        }
    }

    /// Validate a target descriptor and resolve its profile.
    pub fn resolve_target(&self, desc: &TargetDesc) -> Result<ResolvedTarget, ConfigError> {
        let profile_id =
            self.find_profile(&desc.profile)
                .ok_or_else(|| ConfigError::UnknownProfile {
                    name: desc.profile.clone(),
                })?;
        let profile = self
            .profile(profile_id)
            .ok_or_else(|| ConfigError::UnknownProfile {
                name: desc.profile.clone(),
            })?;

        if !self.accepts(desc.format, profile) {
            return Err(ConfigError::IncompatibleProfile {
                profile: desc.profile.clone(),
                format: desc.format.to_string(),
            });
        }

        let caps = self.capabilities(desc.format);
        let unsupported = desc.flags - caps.supported_flags();
        if !unsupported.is_empty() {
            return Err(ConfigError::UnsupportedTargetFlags {
                format: desc.format.to_string(),
                flags: format!("{:?}", unsupported),
            });
        }

        Ok(ResolvedTarget {
            desc: desc.clone(),
            profile: profile_id,
            caps,
        })
    }
}

//! Container configuration builder
//!
//! [`LxcConfigBuilder`] appends the per-instance directives to a loaded
//! configuration in a fixed order:
//!
//! 1. name (`lxc.utsname`)
//! 2. rootfs (`lxc.rootfs`, only when the rootfs exists)
//! 3. logging (`lxc.logfile`)
//! 4. network (`lxc.network.*`, one block per interface)
//! 5. console (`lxc.console.logfile`)
//! 6. limits (`lxc.cgroup.*`)
//! 7. user namespace (`lxc.id_map`, unprivileged only)
//!
//! [`synthesize`] runs the whole pipeline against the instance's config file.

use flex_core::{Error, Instance, LxcOptions, NetworkInterface, Result, SecurityMode};
use flex_security::{IdMap, SecurityPolicy};
use std::path::PathBuf;

use crate::document::keys;
use crate::paths::InstancePaths;
use crate::target::{ConfigTarget, FileTarget};
use crate::template::{write_template_includes, TemplateResolver};

/// LXC network type used for every interface
pub const NETWORK_TYPE_VETH: &str = "veth";

/// Appends instance directives to a container configuration
///
/// The builder owns its target until [`build`](Self::build) hands it back.
/// The security mode is classified once, at construction.
pub struct LxcConfigBuilder<'a, T: ConfigTarget> {
    target: T,
    instance: &'a Instance,
    network_info: &'a [NetworkInterface],
    idmap: &'a IdMap,
    options: &'a LxcOptions,
    paths: InstancePaths,
    security: SecurityMode,
}

impl<'a, T: ConfigTarget> LxcConfigBuilder<'a, T> {
    /// Create a builder for `instance`
    pub fn new(
        target: T,
        instance: &'a Instance,
        network_info: &'a [NetworkInterface],
        idmap: &'a IdMap,
        options: &'a LxcOptions,
        policy: &dyn SecurityPolicy,
    ) -> Self {
        let security = policy.classify(instance);

        tracing::debug!(
            instance_id = %instance.id,
            security = %security,
            "Classified container security mode"
        );

        Self {
            target,
            instance,
            network_info,
            idmap,
            options,
            paths: InstancePaths::new(&options.instances_path),
            security,
        }
    }

    /// Security mode this builder was created with
    #[must_use]
    pub const fn security_mode(&self) -> SecurityMode {
        self.security
    }

    /// Load the target, append every directive, and save
    ///
    /// Nothing is saved unless every step succeeds.
    pub fn build(mut self) -> Result<T> {
        tracing::debug!(instance_id = %self.instance.id, "Building LXC container configuration");

        self.target.load_config()?;

        self.config_name()?;
        self.config_rootfs()?;
        self.config_logging()?;
        self.config_network()?;
        self.config_console()?;
        self.config_limits()?;
        self.config_user()?;

        self.target.save_config()?;

        Ok(self.target)
    }

    fn append(&mut self, key: &str, value: &str) -> Result<()> {
        self.target.append_config_item(key, value)
    }

    fn config_name(&mut self) -> Result<()> {
        let instance = self.instance;
        self.append(keys::UTSNAME, instance.id.as_str())
    }

    fn config_rootfs(&mut self) -> Result<()> {
        let rootfs = self.paths.rootfs(&self.instance.id);

        if rootfs.exists() {
            return self.append(keys::ROOTFS, &rootfs.to_string_lossy());
        }

        if self.options.require_rootfs {
            return Err(Error::MissingRootfs { path: rootfs });
        }

        tracing::warn!(
            instance_id = %self.instance.id,
            path = %rootfs.display(),
            "Rootfs does not exist yet, omitting lxc.rootfs"
        );
        Ok(())
    }

    fn config_logging(&mut self) -> Result<()> {
        let logfile = self.paths.logfile(&self.instance.id);
        self.append(keys::LOGFILE, &logfile.to_string_lossy())
    }

    fn config_network(&mut self) -> Result<()> {
        let network_info = self.network_info;

        for vif in network_info {
            vif.validate()?;
            let bridge = vif.bridge_name();

            tracing::debug!(
                instance_id = %self.instance.id,
                vif_id = vif.short_id(),
                vif_type = %vif.vif_type,
                bridge = %bridge,
                "Adding network interface"
            );

            self.append(keys::NETWORK_TYPE, NETWORK_TYPE_VETH)?;
            self.append(keys::NETWORK_HWADDR, &vif.address)?;
            self.append(keys::NETWORK_LINK, &bridge)?;
        }
        Ok(())
    }

    fn config_console(&mut self) -> Result<()> {
        let console = self.paths.console(&self.instance.id);
        self.append(keys::CONSOLE_LOGFILE, &console.to_string_lossy())
    }

    fn config_limits(&mut self) -> Result<()> {
        let memory = self.instance.flavor.lxc_memory_limit();
        self.append(keys::MEMORY_LIMIT, &memory)?;

        let options = self.options;
        if let Some(cpus) = &options.cpuset_cpus {
            self.append(keys::CPUSET_CPUS, cpus)?;
        }
        Ok(())
    }

    fn config_user(&mut self) -> Result<()> {
        if self.security != SecurityMode::Unprivileged {
            return Ok(());
        }

        let idmap = self.idmap;
        for (key, value) in idmap.lxc_conf_lines() {
            self.append(key, &value)?;
        }
        Ok(())
    }
}

/// Outcome of a successful synthesis
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynthesisReport {
    /// Template the configuration includes
    pub template: String,
    /// Written configuration file
    pub config_path: PathBuf,
    /// Security mode the instance was classified as
    pub security: SecurityMode,
    /// Number of directives written after the includes
    pub directives: usize,
}

/// Synthesize and persist the LXC configuration for `instance`
///
/// Resolves the template, writes the include fragment, then loads that file
/// and appends every directive. A template that is not installed on the host
/// stops the pipeline before anything is written.
pub fn synthesize(
    options: &LxcOptions,
    policy: &dyn SecurityPolicy,
    instance: &Instance,
    network_info: &[NetworkInterface],
    idmap: &IdMap,
) -> Result<SynthesisReport> {
    let template = TemplateResolver::from_options(options).resolve(&instance.image_meta)?;

    let config_path = InstancePaths::new(&options.instances_path).config(&instance.id);
    write_template_includes(&template, &options.config_dir, &config_path)?;

    let builder = LxcConfigBuilder::new(
        FileTarget::new(&config_path),
        instance,
        network_info,
        idmap,
        options,
        policy,
    );
    let security = builder.security_mode();
    let target = builder.build()?;

    let report = SynthesisReport {
        template,
        config_path,
        security,
        directives: target.document().directives().len(),
    };

    tracing::info!(
        instance_id = %instance.id,
        template = %report.template,
        security = %report.security,
        directives = report.directives,
        "LXC configuration written"
    );

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::target::MemoryTarget;
    use flex_core::{Flavor, InstanceId};
    use flex_security::MetadataPolicy;

    fn instance(memory_mb: u64) -> Instance {
        Instance::new(InstanceId::new("abc-123").unwrap(), Flavor::new(memory_mb, 1))
    }

    fn options(root: &std::path::Path) -> LxcOptions {
        LxcOptions::default().with_instances_path(root)
    }

    fn build(
        instance: &Instance,
        network_info: &[NetworkInterface],
        options: &LxcOptions,
        mode: SecurityMode,
    ) -> crate::ConfigDocument {
        let idmap = IdMap::default_unprivileged();
        let policy = MetadataPolicy::new(mode);
        let target = LxcConfigBuilder::new(
            MemoryTarget::new(),
            instance,
            network_info,
            &idmap,
            options,
            &policy,
        )
        .build()
        .unwrap();

        target.saved().unwrap().clone()
    }

    fn keys_of(doc: &crate::ConfigDocument) -> Vec<&str> {
        doc.directives().iter().map(|d| d.key.as_str()).collect()
    }

    #[test]
    fn test_directive_order() {
        let dir = tempfile::tempdir().unwrap();
        let options = options(dir.path());
        let inst = instance(512);
        std::fs::create_dir_all(InstancePaths::new(dir.path()).rootfs(&inst.id)).unwrap();
        let vifs = [NetworkInterface::new("0123456789abcdef", "bridge", "aa:bb:cc:dd:ee:ff", "br100")];

        let doc = build(&inst, &vifs, &options, SecurityMode::Unprivileged);

        assert_eq!(
            keys_of(&doc),
            vec![
                keys::UTSNAME,
                keys::ROOTFS,
                keys::LOGFILE,
                keys::NETWORK_TYPE,
                keys::NETWORK_HWADDR,
                keys::NETWORK_LINK,
                keys::CONSOLE_LOGFILE,
                keys::MEMORY_LIMIT,
                keys::ID_MAP,
                keys::ID_MAP,
            ]
        );
        assert_eq!(doc.get(keys::UTSNAME), Some("abc-123"));
    }

    #[test]
    fn test_missing_rootfs_is_omitted() {
        let dir = tempfile::tempdir().unwrap();
        let doc = build(&instance(512), &[], &options(dir.path()), SecurityMode::Privileged);

        assert!(!doc.contains_key(keys::ROOTFS));
        assert!(doc.contains_key(keys::LOGFILE));
    }

    #[test]
    fn test_missing_rootfs_required() {
        let dir = tempfile::tempdir().unwrap();
        let options = options(dir.path()).with_require_rootfs(true);
        let inst = instance(512);
        let idmap = IdMap::default_unprivileged();
        let policy = MetadataPolicy::default();

        let builder =
            LxcConfigBuilder::new(MemoryTarget::new(), &inst, &[], &idmap, &options, &policy);
        let err = builder.build().err().unwrap();

        assert!(matches!(err, Error::MissingRootfs { .. }));
    }

    #[test]
    fn test_memory_limit() {
        let dir = tempfile::tempdir().unwrap();
        let doc = build(&instance(512), &[], &options(dir.path()), SecurityMode::Privileged);

        assert_eq!(doc.get(keys::MEMORY_LIMIT), Some("512M"));
        assert!(!doc.contains_key(keys::CPUSET_CPUS));
    }

    #[test]
    fn test_memory_limit_stays_in_megabytes() {
        let dir = tempfile::tempdir().unwrap();
        let doc = build(&instance(1 << 44), &[], &options(dir.path()), SecurityMode::Privileged);

        assert_eq!(doc.get(keys::MEMORY_LIMIT), Some("17592186044416M"));
    }

    #[test]
    fn test_line_break_in_interface_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let options = options(dir.path());
        let inst = instance(512);
        let idmap = IdMap::default_unprivileged();
        let policy = MetadataPolicy::new(SecurityMode::Privileged);
        let vifs = [
            NetworkInterface::new(
                "0123456789abcdef",
                "bridge",
                "aa:bb:cc:dd:ee:ff\nlxc.include = /evil.conf\nlxc.rootfs = /",
                "br100",
            ),
            NetworkInterface::new("0123456789abcdef", "bridge", "aa:bb:cc:dd:ee:ff", "br100\nlxc.rootfs = /"),
        ];

        for vif in vifs {
            let network_info = [vif];
            let builder = LxcConfigBuilder::new(
                MemoryTarget::new(),
                &inst,
                &network_info,
                &idmap,
                &options,
                &policy,
            );
            let err = builder.build().err().unwrap();
            assert!(matches!(err, Error::InvalidConfig { .. }), "{err}");
        }
    }

    #[test]
    fn test_cpuset_when_configured() {
        let dir = tempfile::tempdir().unwrap();
        let options = options(dir.path()).with_cpuset_cpus("0-1");
        let doc = build(&instance(256), &[], &options, SecurityMode::Privileged);

        assert_eq!(doc.get(keys::CPUSET_CPUS), Some("0-1"));
        let position = |key: &str| keys_of(&doc).iter().position(|k| *k == key).unwrap();
        assert!(position(keys::MEMORY_LIMIT) < position(keys::CPUSET_CPUS));
    }

    #[test]
    fn test_ovs_interface_bridge() {
        let dir = tempfile::tempdir().unwrap();
        let vifs = [NetworkInterface::new("0123456789abcdef", "ovs", "aa:bb:cc:dd:ee:ff", "br-int")];
        let doc = build(&instance(512), &vifs, &options(dir.path()), SecurityMode::Privileged);

        assert_eq!(doc.values(keys::NETWORK_TYPE).collect::<Vec<_>>(), ["veth"]);
        assert_eq!(
            doc.values(keys::NETWORK_HWADDR).collect::<Vec<_>>(),
            ["aa:bb:cc:dd:ee:ff"]
        );
        assert_eq!(
            doc.values(keys::NETWORK_LINK).collect::<Vec<_>>(),
            ["qbr0123456789a"]
        );
    }

    #[test]
    fn test_every_interface_gets_a_block() {
        let dir = tempfile::tempdir().unwrap();
        let vifs = [
            NetworkInterface::new("aaaaaaaaaaaaaaaa", "ovs", "aa:aa:aa:aa:aa:aa", "br-int"),
            NetworkInterface::new("bbbbbbbbbbbbbbbb", "bridge", "bb:bb:bb:bb:bb:bb", "br100"),
        ];
        let doc = build(&instance(512), &vifs, &options(dir.path()), SecurityMode::Privileged);

        let network: Vec<(&str, &str)> = doc
            .directives()
            .iter()
            .filter(|d| d.key.starts_with("lxc.network."))
            .map(|d| (d.key.as_str(), d.value.as_str()))
            .collect();

        assert_eq!(
            network,
            vec![
                (keys::NETWORK_TYPE, "veth"),
                (keys::NETWORK_HWADDR, "aa:aa:aa:aa:aa:aa"),
                (keys::NETWORK_LINK, "qbraaaaaaaaaaa"),
                (keys::NETWORK_TYPE, "veth"),
                (keys::NETWORK_HWADDR, "bb:bb:bb:bb:bb:bb"),
                (keys::NETWORK_LINK, "br100"),
            ]
        );
    }

    #[test]
    fn test_no_interfaces_no_network_directives() {
        let dir = tempfile::tempdir().unwrap();
        let doc = build(&instance(512), &[], &options(dir.path()), SecurityMode::Privileged);

        assert!(!doc.contains_key(keys::NETWORK_TYPE));
    }

    #[test]
    fn test_privileged_has_no_id_map() {
        let dir = tempfile::tempdir().unwrap();
        let doc = build(&instance(512), &[], &options(dir.path()), SecurityMode::Privileged);

        assert!(!doc.contains_key(keys::ID_MAP));
    }

    #[test]
    fn test_unprivileged_id_map_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let doc = build(&instance(512), &[], &options(dir.path()), SecurityMode::Unprivileged);

        assert_eq!(
            doc.values(keys::ID_MAP).collect::<Vec<_>>(),
            ["u 0 100000 65536", "g 0 100000 65536"]
        );
    }

    #[test]
    fn test_security_mode_classified_from_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let options = options(dir.path());
        let inst = instance(512).with_metadata(MetadataPolicy::METADATA_KEY, "privileged");
        let idmap = IdMap::default_unprivileged();
        let policy = MetadataPolicy::default();

        let builder =
            LxcConfigBuilder::new(MemoryTarget::new(), &inst, &[], &idmap, &options, &policy);
        assert_eq!(builder.security_mode(), SecurityMode::Privileged);

        let target = builder.build().unwrap();
        assert!(!target.saved().unwrap().contains_key(keys::ID_MAP));
    }
}

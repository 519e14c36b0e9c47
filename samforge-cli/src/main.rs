//! Samforge CLI - SAM adapter synthesis
//!
//! This CLI tool generates adapter classes that implement JVM
//! single-abstract-method interfaces by forwarding to a generic callable.
//!
//! ## Usage
//!
//! ```bash
//! # Generate adapters for platform interfaces
//! samforge prepare --ns my.app -i java.util.function.IntPredicate -o classes
//!
//! # Generate an adapter for an interface on a class path, with a manifest
//! samforge prepare --ns my.app -i com.acme.Handler --class-path target/classes --manifest
//!
//! # Inspect a class file
//! samforge inspect classes/my/app/LambdaFactory$java$util$function$IntPredicate.class --code
//!
//! # Check a generated class against the manifest written by `prepare --manifest`
//! samforge inspect classes/my/app/LambdaFactory$java$util$function$IntPredicate.class \
//!     --manifest classes/samforge-manifest.json
//!
//! # Show version
//! samforge version
//! ```

use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use samforge_core::classfile::{self, ClassFile, access};
use samforge_core::manifest::MANIFEST_FILE;
use samforge_core::{
    ArtifactManifest, ClassPath, InterfaceType, ManifestBuilder, ObjectMethodPolicy, SynthesisStats, Synthesizer,
    SynthesizerConfig, TypeRegistry, TypeResolver,
};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

#[derive(Parser)]
#[command(name = "samforge")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Adapter synthesis for single-abstract-method interfaces", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate adapter classes
    Prepare {
        /// Naming context (namespace) the adapters belong to
        #[arg(long = "ns", default_value = "user")]
        namespace: String,

        /// Interfaces to adapt, by binary name
        #[arg(short, long = "interface")]
        interfaces: Vec<String>,

        /// Interface class files to adapt
        #[arg(long = "class-file")]
        class_files: Vec<PathBuf>,

        /// Directories searched for interface class files
        #[arg(long = "class-path")]
        class_path: Vec<PathBuf>,

        /// Output directory (class files land in package subdirectories)
        #[arg(short, long, default_value = ".")]
        output: PathBuf,

        /// Write a manifest with hashes of the generated classes
        #[arg(long)]
        manifest: bool,

        /// Count abstract redeclarations of Object methods (rejects Comparator)
        #[arg(long)]
        naive_object_methods: bool,

        /// Re-read each generated class and disassemble its code
        #[arg(long)]
        validate: bool,

        /// Show synthesis statistics
        #[arg(long)]
        stats: bool,
    },

    /// Inspect a class file
    Inspect {
        /// Input class file
        #[arg(required = true)]
        input: PathBuf,

        /// Directories used to resolve super-interfaces
        #[arg(long = "class-path")]
        class_path: Vec<PathBuf>,

        /// Disassemble method bodies
        #[arg(long)]
        code: bool,

        /// Check the class against the hashes recorded in a manifest
        #[arg(long)]
        manifest: Option<PathBuf>,
    },

    /// List the built-in platform interfaces
    List,

    /// Show version information
    Version,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    if cli.verbose {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("debug")).init();
    } else {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    }

    match cli.command {
        Some(Commands::Prepare {
            namespace,
            interfaces,
            class_files,
            class_path,
            output,
            manifest,
            naive_object_methods,
            validate,
            stats,
        }) => {
            let options = PrepareOptions {
                namespace,
                interfaces,
                class_files,
                class_path,
                output,
                manifest,
                object_methods: if naive_object_methods {
                    ObjectMethodPolicy::Naive
                } else {
                    ObjectMethodPolicy::Exclude
                },
                validate,
                stats,
            };
            prepare_command(&options)?;
        }

        Some(Commands::Inspect {
            input,
            class_path,
            code,
            manifest,
        }) => {
            inspect_command(&input, class_path, code, manifest.as_deref())?;
        }

        Some(Commands::List) => {
            list_command();
        }

        Some(Commands::Version) => {
            println!("samforge v{}", env!("CARGO_PKG_VERSION"));
            println!("Adapter synthesis for single-abstract-method interfaces");
            println!();
            println!("Callable ABI: clojure.lang.IFn (up to 20 parameters)");
            println!("Class-file version: 52 (Java 8)");
            println!();
            println!("License: Apache-2.0");
        }

        None => {
            println!("samforge - SAM adapter synthesis");
            println!();
            println!("Usage: samforge <COMMAND>");
            println!();
            println!("Commands:");
            println!("  prepare   Generate adapter classes");
            println!("  inspect   Inspect a class file");
            println!("  list      List the built-in platform interfaces");
            println!("  version   Show version information");
            println!("  help      Print this message or help for subcommands");
            println!();
            println!("For more information, run: samforge help <command>");
        }
    }

    Ok(())
}

struct PrepareOptions {
    namespace: String,
    interfaces: Vec<String>,
    class_files: Vec<PathBuf>,
    class_path: Vec<PathBuf>,
    output: PathBuf,
    manifest: bool,
    object_methods: ObjectMethodPolicy,
    validate: bool,
    stats: bool,
}

/// Prepare command implementation
fn prepare_command(options: &PrepareOptions) -> Result<()> {
    if options.interfaces.is_empty() && options.class_files.is_empty() {
        return Err(anyhow!("Nothing to prepare: pass --interface or --class-file"));
    }

    println!("Samforge v{} - SAM Adapter Synthesis", env!("CARGO_PKG_VERSION"));

    let resolver = ClassPath::new(options.class_path.iter().cloned()).with_platform_types();
    let config = SynthesizerConfig {
        object_methods: options.object_methods,
        ..Default::default()
    };
    let synthesizer = Synthesizer::new(config, &resolver);

    let mut targets = Vec::new();
    for name in &options.interfaces {
        let interface = resolver
            .resolve(name)
            .with_context(|| format!("Failed to load {}", name))?
            .ok_or_else(|| anyhow!("Interface not found: {}", name))?;
        targets.push(interface);
    }
    for path in &options.class_files {
        let bytes = fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
        let interface = InterfaceType::from_class_bytes(&bytes)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        targets.push(interface);
    }

    println!();
    println!("Namespace: {}", options.namespace);
    println!("Output:    {}", options.output.display());
    println!();

    let start = Instant::now();
    let mut manifest = ManifestBuilder::new("samforge", env!("CARGO_PKG_VERSION"))
        .namespace(&options.namespace)
        .callable(synthesizer.config().callable.class.clone());
    let mut all_stats = Vec::new();

    for interface in &targets {
        let target = synthesizer
            .describe(interface)
            .with_context(|| format!("Cannot adapt {}", interface.name))?;
        let (artifact, stats) = synthesizer
            .prepare_target(&options.namespace, target.clone())
            .with_context(|| format!("Failed to generate adapter for {}", interface.name))?;

        if options.validate {
            validate_class(&artifact.bytes)
                .with_context(|| format!("Generated class {} is invalid", artifact.binary_name()))?;
        }

        let path = artifact
            .write_to(&options.output)
            .with_context(|| format!("Failed to write {}", artifact.binary_name()))?;
        println!("  {}", target);
        println!("    -> {} ({} bytes)", path.display(), artifact.bytes.len());

        manifest = manifest.add_adapter(&artifact, &target, &stats);
        all_stats.push((artifact.binary_name(), stats));
    }

    if options.manifest {
        let path = options.output.join(MANIFEST_FILE);
        let json = manifest.build().to_json().context("Failed to serialize manifest")?;
        fs::write(&path, json).with_context(|| format!("Failed to write {}", path.display()))?;
        println!();
        println!("Manifest: {}", path.display());
    }

    if options.stats {
        print_stats(&all_stats, start.elapsed());
    }

    println!();
    println!("Generated {} adapter(s)", targets.len());

    Ok(())
}

/// Print detailed statistics
fn print_stats(all_stats: &[(String, SynthesisStats)], elapsed: std::time::Duration) {
    println!();
    println!("Synthesis Statistics");
    println!("{}", "=".repeat(50));

    for (name, stats) in all_stats {
        println!();
        println!("{}:", name);
        println!("  Parameters:          {}", stats.arity);
        println!("  Boxed parameters:    {}", stats.boxed_params);
        println!("  Reference params:    {}", stats.reference_params);
        println!("  Unboxed return:      {}", stats.unboxed_return);
        println!("  Constant pool:       {}", stats.constant_pool_count);
        println!("  Class size:          {} bytes", stats.artifact_size);
    }

    let total: usize = all_stats.iter().map(|(_, s)| s.artifact_size).sum();
    println!();
    println!("Total:");
    println!("  Adapters:            {}", all_stats.len());
    println!("  Output size:         {} bytes", total);
    println!("  Time:                {:?}", elapsed);

    println!("{}", "=".repeat(50));
}

/// Inspect command implementation
fn inspect_command(
    input: &Path,
    class_path: Vec<PathBuf>,
    show_code: bool,
    manifest: Option<&Path>,
) -> Result<()> {
    if !input.exists() {
        return Err(anyhow!("Input file not found: {}", input.display()));
    }

    let bytes = fs::read(input).with_context(|| format!("Failed to read {}", input.display()))?;
    let class = classfile::reader::parse(&bytes).context("Failed to parse class file")?;

    println!("Inspecting: {}", input.display());
    println!("  Size: {} bytes", bytes.len());
    println!("  Version: {}.{}", class.major_version, class.minor_version);
    println!("  Class: {}", class.this_class.replace('/', "."));
    println!("  Flags: {}", class_flags(&class));
    if let Some(super_class) = &class.super_class {
        println!("  Super: {}", super_class.replace('/', "."));
    }
    println!("  Constant pool: {} entries", class.constant_pool_count());

    if !class.interfaces.is_empty() {
        println!();
        println!("Interfaces:");
        for interface in &class.interfaces {
            println!("  - {}", interface.replace('/', "."));
        }
    }

    if !class.fields.is_empty() {
        println!();
        println!("Fields:");
        for field in &class.fields {
            println!("  - {} {} [{:#06x}]", field.name, field.descriptor, field.access_flags);
        }
    }

    println!();
    println!("Methods:");
    for method in &class.methods {
        println!("  - {}{} [{:#06x}]", method.name, method.descriptor, method.access_flags);
        let Some(code) = &method.code else {
            continue;
        };
        println!(
            "      max_stack={} max_locals={} code_length={}",
            code.max_stack,
            code.max_locals,
            code.code.len()
        );
        if show_code {
            match classfile::disassemble(&code.code) {
                Ok(instructions) => {
                    for insn in instructions {
                        println!("      {:>4}: {} {}", insn.offset, insn.mnemonic, insn.operand);
                    }
                }
                Err(e) => println!("      (cannot disassemble: {})", e),
            }
        }
    }

    if class.has_flag(access::INTERFACE) {
        let interface = InterfaceType::from_class_file(&class)?;
        let resolver = ClassPath::new(class_path).with_platform_types();
        let synthesizer = Synthesizer::new(SynthesizerConfig::default(), &resolver);
        println!();
        match synthesizer.describe(&interface) {
            Ok(target) => println!("SAM: {}", target),
            Err(e) => println!("Not adaptable: {}", e),
        }
    }

    if let Some(path) = manifest {
        verify_against_manifest(&class, &bytes, path)?;
    }

    Ok(())
}

/// Compare a class file with its manifest entry
fn verify_against_manifest(class: &ClassFile, bytes: &[u8], path: &Path) -> Result<()> {
    let json = fs::read_to_string(path)
        .with_context(|| format!("Failed to read manifest {}", path.display()))?;
    let manifest = ArtifactManifest::from_json(&json)
        .with_context(|| format!("Failed to parse manifest {}", path.display()))?;
    let name = class.this_class.replace('/', ".");

    println!();
    match manifest.verify(&name, bytes) {
        Some(true) => {
            println!("Manifest: hash matches ({})", path.display());
            Ok(())
        }
        Some(false) => Err(anyhow!(
            "Hash of {} does not match {}",
            name,
            path.display()
        )),
        None => Err(anyhow!("{} is not listed in {}", name, path.display())),
    }
}

fn class_flags(class: &ClassFile) -> String {
    const NAMES: &[(u16, &str)] = &[
        (access::PUBLIC, "public"),
        (access::FINAL, "final"),
        (access::SUPER, "super"),
        (access::INTERFACE, "interface"),
        (access::ABSTRACT, "abstract"),
        (access::SYNTHETIC, "synthetic"),
    ];
    let names: Vec<&str> = NAMES
        .iter()
        .filter(|(flag, _)| class.has_flag(*flag))
        .map(|(_, name)| *name)
        .collect();
    format!("{:#06x} ({})", class.access_flags, names.join(" "))
}

/// List command implementation
fn list_command() {
    let registry = TypeRegistry::with_platform_types();
    let synthesizer = Synthesizer::new(SynthesizerConfig::default(), &registry);
    println!("Built-in interfaces:");
    for name in registry.names() {
        let Some(interface) = registry.get(name) else {
            continue;
        };
        match synthesizer.describe(interface) {
            Ok(target) => println!("  {}", target),
            Err(_) => println!("  {} (not a SAM interface)", name),
        }
    }
}

/// Re-read a generated class and disassemble every method body
fn validate_class(bytes: &[u8]) -> Result<()> {
    let class = classfile::reader::parse(bytes)?;
    for method in &class.methods {
        let code = method
            .code
            .as_ref()
            .ok_or_else(|| anyhow!("method {} has no code", method.name))?;
        classfile::disassemble(&code.code)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses() {
        let cli = Cli::try_parse_from(["samforge", "version"]);
        assert!(cli.is_ok());
    }

    #[test]
    fn test_cli_prepare_args() {
        let cli = Cli::try_parse_from([
            "samforge",
            "prepare",
            "--ns",
            "my.app",
            "-i",
            "java.lang.Runnable",
            "--interface",
            "java.util.function.Supplier",
            "--class-path",
            "classes",
            "-o",
            "out",
            "--manifest",
        ])
        .unwrap();
        match cli.command {
            Some(Commands::Prepare {
                namespace,
                interfaces,
                class_path,
                output,
                manifest,
                naive_object_methods,
                ..
            }) => {
                assert_eq!(namespace, "my.app");
                assert_eq!(interfaces.len(), 2);
                assert_eq!(class_path, vec![PathBuf::from("classes")]);
                assert_eq!(output, PathBuf::from("out"));
                assert!(manifest);
                assert!(!naive_object_methods);
            }
            _ => panic!("expected prepare"),
        }
    }

    #[test]
    fn test_cli_verbose() {
        let cli = Cli::parse_from(["samforge", "-v", "version"]);
        assert!(cli.verbose);
    }

    #[test]
    fn test_cli_inspect_requires_input() {
        assert!(Cli::try_parse_from(["samforge", "inspect"]).is_err());
    }

    fn options(output: &Path, interfaces: &[&str]) -> PrepareOptions {
        PrepareOptions {
            namespace: "my-app.core".to_string(),
            interfaces: interfaces.iter().map(|s| s.to_string()).collect(),
            class_files: Vec::new(),
            class_path: Vec::new(),
            output: output.to_path_buf(),
            manifest: true,
            object_methods: ObjectMethodPolicy::Exclude,
            validate: true,
            stats: false,
        }
    }

    #[test]
    fn test_prepare_writes_classes_and_manifest() {
        let dir = tempfile::tempdir().unwrap();
        prepare_command(&options(
            dir.path(),
            &["java.util.function.IntPredicate", "java.lang.Runnable"],
        ))
        .unwrap();

        let class = dir
            .path()
            .join("my_app/core/LambdaFactory$java$util$function$IntPredicate.class");
        let bytes = fs::read(&class).unwrap();
        assert_eq!(&bytes[..4], &[0xCA, 0xFE, 0xBA, 0xBE]);

        let json = fs::read_to_string(dir.path().join(MANIFEST_FILE)).unwrap();
        let manifest = samforge_core::ArtifactManifest::from_json(&json).unwrap();
        assert_eq!(manifest.namespace, "my-app.core");
        assert_eq!(manifest.adapters.len(), 2);
        assert_eq!(
            manifest.verify("my_app.core.LambdaFactory$java$util$function$IntPredicate", &bytes),
            Some(true)
        );
    }

    #[test]
    fn test_prepare_rejects_non_sam() {
        let dir = tempfile::tempdir().unwrap();
        let err = prepare_command(&options(dir.path(), &["java.util.Iterator"])).unwrap_err();
        assert!(format!("{:#}", err).contains("not a single-abstract-method interface"));
    }

    #[test]
    fn test_prepare_unknown_interface() {
        let dir = tempfile::tempdir().unwrap();
        let err = prepare_command(&options(dir.path(), &["com.acme.Missing"])).unwrap_err();
        assert!(err.to_string().contains("Interface not found"));
    }

    #[test]
    fn test_prepare_requires_a_target() {
        let dir = tempfile::tempdir().unwrap();
        assert!(prepare_command(&options(dir.path(), &[])).is_err());
    }

    #[test]
    fn test_inspect_generated_class() {
        let dir = tempfile::tempdir().unwrap();
        prepare_command(&options(dir.path(), &["java.util.function.Supplier"])).unwrap();
        let class = dir
            .path()
            .join("my_app/core/LambdaFactory$java$util$function$Supplier.class");
        inspect_command(&class, Vec::new(), true, None).unwrap();
    }

    #[test]
    fn test_inspect_verifies_manifest() {
        let dir = tempfile::tempdir().unwrap();
        prepare_command(&options(
            dir.path(),
            &["java.util.function.Supplier", "java.lang.Runnable"],
        ))
        .unwrap();
        let manifest = dir.path().join(MANIFEST_FILE);
        let supplier = dir
            .path()
            .join("my_app/core/LambdaFactory$java$util$function$Supplier.class");
        inspect_command(&supplier, Vec::new(), false, Some(&manifest)).unwrap();

        // same class name, different bytes
        let bytes = fs::read(&supplier).unwrap();
        let class = classfile::reader::parse(&bytes).unwrap();
        let mut tampered = bytes.clone();
        tampered.push(0);
        let err = verify_against_manifest(&class, &tampered, &manifest).unwrap_err();
        assert!(err.to_string().contains("does not match"));

        // a class the manifest does not list
        let other = tempfile::tempdir().unwrap();
        prepare_command(&options(other.path(), &["java.util.function.IntSupplier"])).unwrap();
        let unlisted = other
            .path()
            .join("my_app/core/LambdaFactory$java$util$function$IntSupplier.class");
        let err = inspect_command(&unlisted, Vec::new(), false, Some(&manifest)).unwrap_err();
        assert!(err.to_string().contains("is not listed"));
    }
}

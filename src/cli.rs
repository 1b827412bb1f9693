use std::{
    io::{stdout, BufWriter, Write},
    path::{Path, PathBuf},
};

use anyhow::Result;
use clap::{CommandFactory, Parser};
use log::debug;

use crate::{
    arguments,
    error::ValidationError,
    manifest::{self, Manifest, ManifestDocument},
    metadata::{MetadataReader, PeVersionReader},
    nuget::{self, NuGet, PackagingTool},
};

const FLAGS_HELP: &str = "\
Flags:
  /OutPutDir [dir]
      Sets the root of the to be packed files. Required.
  /dll [path]
      Sets the location of the dll, relative to the output dir. Required.
  /id [Name]
      Sets the package, NuSpec and NuGet file names. Defaults to the product name.
  /authors [Author1 Author2]
      Sets the authors. Defaults to the company name.
  /owners [Owner1 Owner2]
      Sets the owners. Defaults to the company name.
  /licenseUrl [http://example.com]
      Sets the license URL.
  /projectUrl [http://example.com]
      Sets the project URL.
  /iconUrl [http://example.com/icon.ico]
      Sets the icon.
  /requireLicenseAcceptance [true|false]
      Defaults to false.
  /description [text]
      Sets the description. Defaults to the assembly comments.
  /tags [text]
      Sets the tags.
  /dependencies [\"Dependency1 1.0\" \"Dependency2 2.0\"]
      Sets the dependencies.
  /updateNuGet [true|false]
      Updates NuGet to the latest version first if true. Defaults to false.
  /?
      Shows this help.";

const HELP_FLAG: &str = "/?";

/// Generate a NuSpec manifest from a compiled assembly and pack it with NuGet
#[derive(Debug, Parser)]
#[command(name = "nuspec-deploy", version)]
#[command(styles = clap_cargo::style::CLAP_STYLING)]
#[command(after_help = FLAGS_HELP)]
pub struct DeployOption {
    /// Path to the NuGet command line
    #[arg(long, value_name = "PATH", env = "NUSPEC_DEPLOY_NUGET", default_value = "NuGet.exe")]
    nuget: PathBuf,

    /// Directory NuGet runs in [default: "NuGet Packages" beside this executable]
    #[arg(long, value_name = "DIR", env = "NUSPEC_DEPLOY_PACKAGES_DIR")]
    packages_dir: Option<PathBuf>,

    /// Print the manifest instead of writing it, and skip NuGet
    #[arg(long)]
    dry_run: bool,

    /// Packaging flags, e.g. /OutPutDir bin\Release /dll Library.dll
    #[arg(value_name = "FLAGS", num_args = 1.., trailing_var_arg = true, allow_hyphen_values = true)]
    flags: Vec<String>,
}

pub(crate) trait DeployOptionTool {
    fn nuget(&self) -> &Path;
    fn packages_dir(&self) -> Option<&Path>;
}

pub(crate) trait DeployOptionDryRun {
    fn dry_run(&self) -> bool;
}

impl DeployOptionTool for DeployOption {
    fn nuget(&self) -> &Path {
        &self.nuget
    }

    fn packages_dir(&self) -> Option<&Path> {
        self.packages_dir.as_deref()
    }
}

impl DeployOptionDryRun for DeployOption {
    fn dry_run(&self) -> bool {
        self.dry_run
    }
}

/// One manifest-and-pack run against a metadata source and a packaging tool.
pub struct Deploy<Reader, Tool> {
    pub reader: Reader,
    pub tool: Tool,
    pub dry_run: bool,
}

impl<Reader, Tool> Deploy<Reader, Tool>
where
    Reader: MetadataReader,
    Tool: PackagingTool,
{
    pub fn run(&self, arguments: &[String], out: &mut dyn Write) -> Result<()> {
        let flags = arguments::parse_multi_values(arguments);
        debug!("parsed flags {:?}", flags);

        manifest::check_required(&flags)?;

        let update = manifest::is_self_update(&flags);
        if update && !self.dry_run {
            writeln!(out, "Trying to update NuGet...")?;
            writeln!(out)?;
            self.tool.update_self(out)?;
        }

        if manifest::is_update_only(&flags) {
            return Ok(());
        }

        let artifact = self.reader.read(&manifest::artifact_path(&flags)?)?;

        writeln!(
            out,
            "Generating the NuSpec file for {} version {}.",
            artifact.product_name, artifact.file_version
        )?;
        writeln!(out)?;

        let manifest = Manifest::build(&flags, &artifact)?;
        writeln!(out, "Finished generating the NuSpec file successfully.")?;

        if self.dry_run {
            return manifest.print(out);
        }

        write!(out, "Writing NuSpec file... ")?;
        manifest.write()?;
        writeln!(out, "NuSpec file saved successfully.")?;
        writeln!(out)?;

        writeln!(out, "Starting to build the NuGet pack...")?;
        writeln!(out)?;
        self.tool.pack(manifest.path(), out)
    }
}

fn wants_help(flags: &[String]) -> bool {
    flags.first().map_or(true, |flag| flag == HELP_FLAG)
}

fn print_help(out: &mut dyn Write) -> Result<()> {
    let help = DeployOption::command().render_long_help();
    bufwrite(out, help.to_string())
}

fn print_error(out: &mut dyn Write, error: &ValidationError) -> Result<()> {
    let program = DeployOption::command().get_name().to_string();

    writeln!(out)?;
    writeln!(out, "  The NuSpec deploy tool")?;
    writeln!(out, "  ----------------------")?;
    writeln!(out)?;
    writeln!(out, "  An error has occurred. Please check if you supplied all the needed flags.")?;
    writeln!(out, "  Error message: {error}")?;
    writeln!(out)?;
    writeln!(out, "  Type \"{program} {HELP_FLAG}\" (without the quotes) for more info.")?;
    writeln!(out)?;
    Ok(())
}

/// Runs a deploy, rendering validation failures instead of returning them.
pub(crate) fn report<Reader, Tool>(deploy: &Deploy<Reader, Tool>, flags: &[String], out: &mut dyn Write) -> Result<()>
where
    Reader: MetadataReader,
    Tool: PackagingTool,
{
    match deploy.run(flags, out) {
        Err(error) => match error.downcast_ref::<ValidationError>() {
            Some(validation) => print_error(out, validation),
            None => Err(error),
        },
        Ok(()) => Ok(()),
    }
}

pub fn execute() -> Result<()> {
    let option = DeployOption::parse();

    let stdout = stdout();
    let mut out = stdout.lock();

    deploy_with(&option, &mut out)?;
    out.flush()?;
    Ok(())
}

pub(crate) fn deploy_with(option: &DeployOption, out: &mut dyn Write) -> Result<()> {
    if wants_help(&option.flags) {
        return print_help(out);
    }

    let packages_dir = match option.packages_dir() {
        Some(dir) => dir.to_path_buf(),
        None => nuget::default_packages_dir()?,
    };

    let deploy = Deploy {
        reader: PeVersionReader,
        tool: NuGet::new(option.nuget(), packages_dir),
        dry_run: option.dry_run(),
    };

    report(&deploy, &option.flags, out)
}

pub(crate) fn bufwrite(inner: impl Write, content: impl Into<String>) -> Result<()> {
    let mut buffer = BufWriter::new(inner);
    write!(buffer, "{}", content.into())?;
    buffer.flush()?;

    Ok(())
}

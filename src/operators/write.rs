//! Write operators: persist pipeline data into the output directory.

use crate::core::error::OperatorError;
use crate::core::metadata::RunContext;
use crate::core::operator::{Args, Operator, Param};
use crate::core::registry::OperatorRegistryBuilder;
use crate::core::types::Value;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use tracing::info;

/// Metadata key indexing files written by operators.
pub const OUTPUT_INDEX_KEY: &str = "outputs";

const WRITE_JSON: &[Param] = &[
    Param::required("data"),
    Param::optional("filename"),
    Param::optional("overwrite"),
];

pub fn register(builder: &mut OperatorRegistryBuilder) {
    builder.register(Operator::new("write.write_json", WRITE_JSON, write_json));
}

/// Lowercase a title, joining alphanumeric runs with underscores.
pub fn slugify(title: &str) -> String {
    title
        .split(|c: char| !c.is_alphanumeric())
        .filter(|part| !part.is_empty())
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join("_")
}

/// Default output name: the slugified recipe title, or `untitled.json`.
fn default_filename(ctx: &RunContext) -> Result<String, OperatorError> {
    let meta = ctx.recipe_metadata()?;
    let slug = meta
        .get("title")
        .and_then(|t| t.as_str())
        .map(slugify)
        .unwrap_or_default();
    if slug.is_empty() {
        Ok("untitled.json".to_string())
    } else {
        Ok(format!("{}.json", slug))
    }
}

/// Open for writing; without `overwrite` the file must not already exist.
fn open_output(path: &Path, overwrite: bool) -> io::Result<File> {
    let mut options = OpenOptions::new();
    options.write(true);
    if overwrite {
        options.create(true).truncate(true);
    } else {
        options.create_new(true);
    }
    options.open(path)
}

/// Write the data as pretty JSON and pass it through unchanged.
fn write_json(args: Args, ctx: &RunContext) -> Result<Value, OperatorError> {
    let filename = match args.opt_str("filename")? {
        Some(name) => name.to_string(),
        None => default_filename(ctx)?,
    };
    let overwrite = args.opt_bool("overwrite")?.unwrap_or(false);
    let data = args.get("data").cloned().unwrap_or_default();

    let json = match &data {
        Value::Nothing => serde_json::Value::Null,
        Value::Literal(node) => serde_json::to_value(node)?,
        Value::Handle(h) => {
            return Err(format!("cannot write {} as JSON", h.type_name()).into());
        }
    };

    let path = Path::new(&filename);
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .map_err(|e| format!("cannot create {}: {}", parent.display(), e))?;
    }
    let mut file = open_output(path, overwrite).map_err(|e| match e.kind() {
        io::ErrorKind::AlreadyExists => {
            format!("{} already exists; set overwrite to replace it", filename)
        }
        _ => format!("cannot write {}: {}", filename, e),
    })?;
    file.write_all(serde_json::to_string_pretty(&json)?.as_bytes())
        .map_err(|e| format!("cannot write {}: {}", filename, e))?;

    ctx.metadata()
        .append_to_index(OUTPUT_INDEX_KEY, std::slice::from_ref(&filename))?;
    info!("Wrote {}", filename);
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::metadata::{MetadataFile, RunMetadata, META_FILE};
    use crate::core::runner::{serial, WorkingDirectory};
    use serde_json::json;
    use serde_yaml_ng::Value as Node;

    fn seeded(dir: &Path, title: Option<&str>) -> RunContext {
        let mut meta = RunMetadata::new();
        if let Some(t) = title {
            meta.insert("title".to_string(), json!(t));
        }
        MetadataFile::new(dir.join(META_FILE)).seed(&meta).unwrap();
        RunContext::in_directory(dir)
    }

    fn write_args(data: &str, filename: Option<&Path>) -> Args {
        let mut args = Args::new();
        args.insert("data", serde_yaml_ng::from_str::<Node>(data).unwrap());
        if let Some(f) = filename {
            args.insert("filename", Node::String(f.display().to_string()));
        }
        args
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Surface Air Temperature"), "surface_air_temperature");
        assert_eq!(slugify("  Mean (K) -- 2m  "), "mean_k_2m");
        assert_eq!(slugify("***"), "");
    }

    #[test]
    fn test_write_json_explicit_filename() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = seeded(dir.path(), None);
        let target = dir.path().join("out").join("data.json");

        let out = write_json(write_args("{a: [1, 2]}", Some(&target)), &ctx).unwrap();
        assert_eq!(out, Value::Literal(serde_yaml_ng::from_str("{a: [1, 2]}").unwrap()));

        let written: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&target).unwrap()).unwrap();
        assert_eq!(written, json!({"a": [1, 2]}));

        let meta = ctx.recipe_metadata().unwrap();
        assert_eq!(meta[OUTPUT_INDEX_KEY], json!([target.display().to_string()]));
    }

    #[test]
    fn test_write_json_refuses_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = seeded(dir.path(), None);
        let target = dir.path().join("data.json");
        std::fs::write(&target, "old").unwrap();

        let err = write_json(write_args("1", Some(&target)), &ctx).unwrap_err();
        assert!(err.to_string().contains("already exists"));
        assert_eq!(std::fs::read_to_string(&target).unwrap(), "old");

        let mut args = write_args("1", Some(&target));
        args.insert("overwrite", Node::Bool(true));
        write_json(args, &ctx).unwrap();
        assert_eq!(std::fs::read_to_string(&target).unwrap(), "1");
    }

    #[test]
    fn test_open_output_claims_new_file() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("claimed.json");

        let _first = open_output(&target, false).unwrap();
        let err = open_output(&target, false).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::AlreadyExists);

        let mut replaced = open_output(&target, true).unwrap();
        replaced.write_all(b"2").unwrap();
        assert_eq!(std::fs::read_to_string(&target).unwrap(), "2");
    }

    #[test]
    fn test_write_json_default_filename_from_title() {
        let _serial = serial();
        let dir = tempfile::tempdir().unwrap();
        let ctx = seeded(dir.path(), Some("Air Temperature Mean"));
        {
            let _cwd = WorkingDirectory::enter(dir.path()).unwrap();
            write_json(write_args("3.5", None), &ctx).unwrap();
        }
        let written = dir.path().join("air_temperature_mean.json");
        assert_eq!(std::fs::read_to_string(written).unwrap(), "3.5");
    }

    #[test]
    fn test_write_json_untitled() {
        let _serial = serial();
        let dir = tempfile::tempdir().unwrap();
        let ctx = seeded(dir.path(), None);
        {
            let _cwd = WorkingDirectory::enter(dir.path()).unwrap();
            write_json(write_args("null", None), &ctx).unwrap();
        }
        assert!(dir.path().join("untitled.json").is_file());
        let meta = ctx.recipe_metadata().unwrap();
        assert_eq!(meta[OUTPUT_INDEX_KEY], json!(["untitled.json"]));
    }

    #[test]
    fn test_write_json_rejects_handles() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = seeded(dir.path(), None);
        let mut args = Args::new();
        args.insert("data", crate::core::types::Handle::new(5u8));
        args.insert(
            "filename",
            Node::String(dir.path().join("h.json").display().to_string()),
        );
        let err = write_json(args, &ctx).unwrap_err();
        assert!(err.to_string().starts_with("cannot write u8"));
    }
}

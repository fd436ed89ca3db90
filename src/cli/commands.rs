//! Command implementations for the sundial CLI.

use std::fs::{self, File};
use std::io::{BufRead, BufReader};
use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use log::{debug, warn};
use serde_json::Value;

use crate::cli::args::*;
use crate::cli::output::*;
use crate::config::SundialConfig;
use crate::error::{Result, SundialError};
use crate::meta::{Alias, FileMetaKv, Index, IndexSettings, IndexTemplate, MetadataStore};
use crate::segment::terms::{display_term, term_from_str};
use crate::segment::{
    FuzzyMatcher, RegexMatcher, SegmentBuilder, SegmentReader, TermMatcher, prefix_bounds,
};
use crate::storage::file::LocalObjectStore;
use crate::storage::{ObjectMeta, ObjectStore};

/// Execute a CLI command.
pub fn execute_command(args: SundialArgs) -> Result<()> {
    let config = SundialConfig::load_or_default(args.config.as_deref())?;
    debug!("using data directory {}", config.data_dir.display());

    match &args.command {
        Command::Index(command) => {
            with_metadata(&config, |store| index_command(command, store, &args))
        }
        Command::Alias(command) => {
            with_metadata(&config, |store| alias_command(command, store, &args))
        }
        Command::Template(command) => {
            with_metadata(&config, |store| template_command(command, store, &args))
        }
        Command::Object(command) => object_command(command, &open_objects(&config)?, &args),
        Command::Segment(SegmentCommand::Build(build)) => {
            let objects = open_objects(&config)?;
            with_metadata(&config, |store| build_segment(build, store, &objects, &args))
        }
        Command::Segment(SegmentCommand::Scan(scan)) => {
            scan_segment(scan, &open_objects(&config)?, &args)
        }
    }
}

/// Open the metadata store, run `f` and close the store on every path.
fn with_metadata<T>(
    config: &SundialConfig,
    f: impl FnOnce(&MetadataStore) -> Result<T>,
) -> Result<T> {
    let kv = FileMetaKv::open(config.metadata_kv_config())?;
    let store = MetadataStore::open(Arc::new(kv))?;
    let result = f(&store);
    let closed = store.close();
    let value = result?;
    closed?;
    Ok(value)
}

fn open_objects(config: &SundialConfig) -> Result<LocalObjectStore> {
    LocalObjectStore::new(config.object_store_config())
}

fn not_found(kind: &str, name: &str) -> SundialError {
    SundialError::invalid_argument(format!("unknown {kind} '{name}'"))
}

fn index_command(command: &IndexCommand, store: &MetadataStore, args: &SundialArgs) -> Result<()> {
    match command {
        IndexCommand::Create(create) => {
            let index = store.create_index(index_from_args(create)?)?;
            output_result(
                "Index created",
                &Named {
                    name: &index.name,
                    definition: &index,
                },
                args,
            )
        }
        IndexCommand::Get(NameArgs { name }) => {
            let index = store
                .get_index(name)?
                .ok_or_else(|| not_found("index", name))?;
            output_result("", &Named { name, definition: &index }, args)
        }
        IndexCommand::Delete(NameArgs { name }) => {
            let deleted = store.delete_index(name)?;
            output_result(
                "Index deleted",
                &DeletionResult {
                    name: name.clone(),
                    deleted,
                },
                args,
            )
        }
        IndexCommand::List => {
            let indexes = store.list_indexes()?;
            let named: Vec<_> = indexes
                .iter()
                .map(|index| Named {
                    name: &index.name,
                    definition: index,
                })
                .collect();
            output_result("Indexes", &named, args)
        }
    }
}

/// Assemble an index definition from `--body`, `--field` and the shard flags.
fn index_from_args(create: &CreateIndexArgs) -> Result<Index> {
    let mut index: Index = match &create.body {
        Some(path) => serde_json::from_str(&fs::read_to_string(path)?)?,
        None => Index::default(),
    };
    index.name = create.name.clone();

    for field in &create.fields {
        let (name, field_type) = field.split_once(':').ok_or_else(|| {
            SundialError::invalid_argument(format!("expected NAME:TYPE, got '{field}'"))
        })?;
        index = index.with_property(name, field_type);
    }

    if create.shards.is_some() || create.replicas.is_some() {
        let current = index.settings.unwrap_or_default();
        index.settings = Some(IndexSettings::new(
            create.shards.unwrap_or(current.number_of_shards),
            create.replicas.unwrap_or(current.number_of_replicas),
        ));
    }
    Ok(index)
}

fn alias_command(command: &AliasCommand, store: &MetadataStore, args: &SundialArgs) -> Result<()> {
    let show = |alias: &Alias| {
        output_result(
            "",
            &Named {
                name: &alias.name,
                definition: alias,
            },
            args,
        )
    };

    match command {
        AliasCommand::Put(put) => {
            let alias = Alias::new(put.name.clone(), put.indexes.iter().cloned());
            store.create_alias(alias.clone())?;
            show(&alias)
        }
        AliasCommand::Add(member) => show(&store.add_index_to_alias(&member.alias, &member.index)?),
        AliasCommand::Remove(member) => {
            let deleted = store.remove_index_from_alias(&member.alias, &member.index)?;
            output_result(
                "Alias member removed",
                &DeletionResult {
                    name: member.index.clone(),
                    deleted,
                },
                args,
            )
        }
        AliasCommand::Get(NameArgs { name }) => {
            let alias = store
                .get_alias(name)?
                .ok_or_else(|| not_found("alias", name))?;
            show(&alias)
        }
        AliasCommand::Delete(NameArgs { name }) => {
            let deleted = store.delete_alias(name)?;
            output_result(
                "Alias deleted",
                &DeletionResult {
                    name: name.clone(),
                    deleted,
                },
                args,
            )
        }
        AliasCommand::List => {
            let aliases = store.list_aliases()?;
            let named: Vec<_> = aliases
                .iter()
                .map(|alias| Named {
                    name: &alias.name,
                    definition: alias,
                })
                .collect();
            output_result("Aliases", &named, args)
        }
    }
}

fn template_command(
    command: &TemplateCommand,
    store: &MetadataStore,
    args: &SundialArgs,
) -> Result<()> {
    match command {
        TemplateCommand::Put(put) => {
            let mut template: IndexTemplate =
                serde_json::from_str(&fs::read_to_string(&put.body)?)?;
            template.name = put.name.clone();
            let template = store.create_index_template(template)?;
            output_result(
                "Index template stored",
                &Named {
                    name: &template.name,
                    definition: &template,
                },
                args,
            )
        }
        TemplateCommand::Get(NameArgs { name }) => {
            let template = store
                .get_index_template(name)?
                .ok_or_else(|| not_found("index template", name))?;
            output_result(
                "",
                &Named {
                    name,
                    definition: &template,
                },
                args,
            )
        }
        TemplateCommand::Delete(NameArgs { name }) => {
            let deleted = store.delete_index_template(name)?;
            output_result(
                "Index template deleted",
                &DeletionResult {
                    name: name.clone(),
                    deleted,
                },
                args,
            )
        }
        TemplateCommand::List => {
            let templates = store.list_index_templates()?;
            let named: Vec<_> = templates
                .iter()
                .map(|template| Named {
                    name: &template.name,
                    definition: template,
                })
                .collect();
            output_result("Index templates", &named, args)
        }
    }
}

fn summarize(meta: ObjectMeta) -> ObjectSummary {
    ObjectSummary {
        bucket: meta.bucket,
        path: meta.path,
        size: meta.size,
        modified: meta.modified.map(|modified| modified.to_rfc3339()),
    }
}

fn ensure_bucket(store: &dyn ObjectStore, bucket: &str) -> Result<()> {
    if !store.bucket_exists(bucket)? {
        store.create_bucket(bucket)?;
    }
    Ok(())
}

fn object_command(command: &ObjectCommand, store: &dyn ObjectStore, args: &SundialArgs) -> Result<()> {
    match command {
        ObjectCommand::Put(put) => {
            let ObjectLocation { bucket, path } = &put.location;
            let data = fs::read(&put.file)?;
            ensure_bucket(store, bucket)?;
            store.put(bucket, path, &data)?;
            output_result("Object stored", &summarize(store.head(bucket, path)?), args)
        }
        ObjectCommand::Get(get) => {
            let ObjectLocation { bucket, path } = &get.location;
            let data = store.get(bucket, path)?;
            if let Some(output) = &get.output {
                fs::write(output, &data)?;
            }
            output_result("Object fetched", &summarize(store.head(bucket, path)?), args)
        }
        ObjectCommand::Delete(ObjectLocation { bucket, path }) => {
            store.delete(bucket, path)?;
            output_result(
                "Object deleted",
                &DeletionResult {
                    name: format!("{bucket}/{path}"),
                    deleted: true,
                },
                args,
            )
        }
        ObjectCommand::List(list) => {
            let objects: Vec<ObjectSummary> = store
                .list(&list.bucket, &list.prefix)?
                .into_iter()
                .map(summarize)
                .collect();
            output_result("Objects", &objects, args)
        }
    }
}

fn build_segment(
    build: &BuildSegmentArgs,
    store: &MetadataStore,
    objects: &dyn ObjectStore,
    args: &SundialArgs,
) -> Result<()> {
    let start_time = Instant::now();
    let mut indexes = store
        .resolve(&build.index)?
        .ok_or_else(|| not_found("index", &build.index))?;
    if indexes.len() != 1 {
        return Err(SundialError::invalid_argument(format!(
            "'{}' resolves to {} indexes, expected exactly one",
            build.index,
            indexes.len()
        )));
    }
    let index = indexes.remove(0);
    let mut builder = SegmentBuilder::for_index(&index)?;

    let file = File::open(&build.documents)
        .with_context(|| format!("cannot open documents {}", build.documents.display()))?;
    let reader = BufReader::new(file);
    let mut skipped_lines = 0;
    for (line_num, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let indexed = serde_json::from_str::<Value>(&line)
            .map_err(SundialError::from)
            .and_then(|document| builder.add_document(&document));
        if let Err(e) = indexed {
            warn!("skipping line {}: {e}", line_num + 1);
            skipped_lines += 1;
        }
    }

    let segment = builder.build();
    let ObjectLocation { bucket, path } = &build.location;
    ensure_bucket(objects, bucket)?;
    let bytes = segment.persist(objects, bucket, path)?;

    output_result(
        "Segment stored",
        &SegmentBuildResult {
            index: index.name,
            segment_id: segment.id().to_string(),
            documents: segment.doc_count(),
            skipped_lines,
            bytes,
            duration_ms: start_time.elapsed().as_millis() as u64,
        },
        args,
    )
}

fn scan_segment(scan: &ScanSegmentArgs, objects: &dyn ObjectStore, args: &SundialArgs) -> Result<()> {
    let ObjectLocation { bucket, path } = &scan.location;
    let reader = SegmentReader::open_from_store(objects, bucket, path)?;
    let field_type = reader.field_type(&scan.field)?;

    let (start, end) = match &scan.prefix {
        Some(prefix) => {
            let (start, end) = prefix_bounds(&term_from_str(field_type, prefix)?);
            (Some(start), end)
        }
        None => (
            scan.start
                .as_deref()
                .map(|start| term_from_str(field_type, start))
                .transpose()?,
            scan.end
                .as_deref()
                .map(|end| term_from_str(field_type, end))
                .transpose()?,
        ),
    };

    let matcher: Option<Arc<dyn TermMatcher>> = match (&scan.regex, &scan.fuzzy) {
        (Some(pattern), _) => Some(Arc::new(RegexMatcher::new(pattern)?)),
        (None, Some(target)) => Some(Arc::new(FuzzyMatcher::new(target.clone(), scan.max_edits))),
        (None, None) => None,
    };

    let mut iterator =
        reader.dictionary_iterator(&scan.field, matcher, start.as_deref(), end.as_deref())?;
    let limit = scan.limit.unwrap_or(usize::MAX);
    let mut terms = Vec::new();
    while terms.len() < limit {
        let Some(entry) = iterator.next_entry()? else {
            break;
        };
        let doc_ids = if scan.postings {
            Some(reader.postings(entry.locator)?)
        } else {
            None
        };
        terms.push(ScannedTerm {
            term: display_term(field_type, &entry.term),
            doc_freq: entry.locator.doc_freq,
            doc_ids,
        });
    }
    iterator.close();
    reader.close();

    output_result(
        &format!("{} terms", terms.len()),
        &ScanResult {
            field: scan.field.clone(),
            field_type: field_type.to_string(),
            terms,
        },
        args,
    )
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;

    fn create_args(argv: &[&str]) -> CreateIndexArgs {
        let mut full = vec!["sundial", "index", "create"];
        full.extend_from_slice(argv);
        match SundialArgs::try_parse_from(full).unwrap().command {
            Command::Index(IndexCommand::Create(create)) => create,
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_index_from_field_flags() {
        let index = index_from_args(&create_args(&[
            "logs",
            "--field",
            "message:text",
            "--replicas",
            "2",
        ]))
        .unwrap();
        assert_eq!(index.name, "logs");
        assert_eq!(index.mappings.properties["message"].field_type, "text");
        assert_eq!(index.settings, Some(IndexSettings::new(1, 2)));
    }

    #[test]
    fn test_index_from_bad_field_flag() {
        assert!(index_from_args(&create_args(&["logs", "--field", "message"])).is_err());
    }

    #[test]
    fn test_with_metadata_persists_between_runs() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = SundialConfig::default().data_dir(dir.path());

        with_metadata(&config, |store| {
            store.create_index(Index::new("logs").with_property("m", "text"))
        })
        .unwrap();
        let found = with_metadata(&config, |store| store.get_index("logs")).unwrap();
        assert!(found.is_some());
    }
}

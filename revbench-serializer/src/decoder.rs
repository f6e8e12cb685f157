//! Suite Decoder
//!
//! Rebuilds suites through the same constructors a live run uses, so a decoded
//! suite is indistinguishable from a measured one. Statistics are never read from
//! the document; every decoded variant recomputes them.

use crate::document::Element;
use crate::encoder::ROOT_ELEMENT;
use crate::error::SerializeError;
use chrono::{DateTime, Utc};
use rayon::prelude::*;
use revbench_model::{
    ErrorRecord, ErrorStack, Information, MetricResult, ParameterSet, ParameterValue,
    ResultCollection, ResultKind, Subject, Suite, SuiteCollection,
};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;
use uuid::Uuid;

/// Decode a document tree
pub fn decode(root: &Element) -> Result<SuiteCollection, SerializeError> {
    match root.name() {
        "suite" => Ok(SuiteCollection::from(vec![decode_suite(root)?])),
        ROOT_ELEMENT => root
            .children_named("suite")
            .map(decode_suite)
            .collect::<Result<Vec<_>, _>>()
            .map(SuiteCollection::from),
        other => Err(SerializeError::UnexpectedRoot(other.to_string())),
    }
}

/// Decode an XML string
pub fn decode_str(xml: &str) -> Result<SuiteCollection, SerializeError> {
    decode(&Element::parse(xml)?)
}

/// Decode one file
pub fn decode_file(path: &Path) -> Result<SuiteCollection, SerializeError> {
    let xml = std::fs::read_to_string(path).map_err(|source| SerializeError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    decode_str(&xml)
}

/// Decode several files in parallel and merge them in the given order.
///
/// The first failing file aborts the merge; its path is part of the error.
pub fn decode_files<P>(paths: &[P]) -> Result<SuiteCollection, SerializeError>
where
    P: AsRef<Path> + Sync,
{
    let decoded: Vec<SuiteCollection> = paths
        .par_iter()
        .map(|path| {
            let path = path.as_ref();
            decode_file(path).map_err(|source| SerializeError::File {
                path: PathBuf::from(path),
                source: Box::new(source),
            })
        })
        .collect::<Result<_, _>>()?;

    let mut merged = SuiteCollection::new();
    for collection in decoded {
        merged.merge(collection);
    }
    debug!(files = paths.len(), suites = merged.len(), "decoded suite documents");
    Ok(merged)
}

fn decode_suite(element: &Element) -> Result<Suite, SerializeError> {
    let raw_date = element.required("date")?;
    let date = DateTime::parse_from_rfc3339(raw_date)
        .map_err(|_| invalid(element, "date", raw_date))?
        .with_timezone(&Utc);
    let raw_uuid = element.required("uuid")?;
    let uuid = Uuid::parse_str(raw_uuid).map_err(|_| invalid(element, "uuid", raw_uuid))?;

    let mut suite = Suite::with_provenance(
        element.attribute("context").map(str::to_string),
        date,
        element.attribute("config-path").map(PathBuf::from),
        uuid,
    );

    for env in element.children_named("env") {
        for info in env.children() {
            let entries: BTreeMap<String, String> = info
                .attributes()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect();
            suite.add_information(Information::new(info.name(), entries));
        }
    }

    for benchmark_el in element.children_named("benchmark") {
        let benchmark = suite.create_benchmark(benchmark_el.required("class")?);
        for subject_el in benchmark_el.children_named("subject") {
            let subject = benchmark.create_subject(subject_el.required("name")?, Default::default());
            decode_subject(subject, subject_el)?;
        }
    }

    Ok(suite)
}

fn decode_subject(subject: &mut Subject, element: &Element) -> Result<(), SerializeError> {
    let options = subject.options_mut();
    options.groups = element
        .children_named("group")
        .map(|group| group.required("name").map(str::to_string))
        .collect::<Result<_, _>>()?;

    // reporting settings live on the subject but are written on each variant
    if let Some(first) = element.children_named("variant").next() {
        options.sleep_us = first.parse_optional("sleep")?.unwrap_or(0);
        options.output_time_unit = first.attribute("output-time-unit").map(str::to_string);
        options.output_time_precision = first.parse_optional("output-time-precision")?;
        options.output_mode = first.attribute("output-mode").map(str::to_string);
        options.retry_threshold = first.parse_optional("retry-threshold")?;
    }

    for (index, variant_el) in element.children_named("variant").enumerate() {
        let parameters = ParameterSet::from_values(index, decode_parameters(variant_el)?);
        let variant = subject.create_variant(
            parameters,
            variant_el.parse_required("revs")?,
            variant_el.parse_required("warmup")?,
        )?;

        let errors: Vec<ErrorRecord> = variant_el
            .children_named("error")
            .map(decode_error)
            .collect::<Result<_, _>>()?;
        if !errors.is_empty() {
            variant.set_error_stack(ErrorStack::new(errors)?)?;
            continue;
        }

        for iteration_el in variant_el.children_named("iteration") {
            variant.create_iteration(decode_results(iteration_el)?)?;
        }
        variant.compute_stats();
    }

    Ok(())
}

fn decode_parameters(element: &Element) -> Result<BTreeMap<String, ParameterValue>, SerializeError> {
    let mut parameters = BTreeMap::new();
    for parameter in element.children_named("parameter") {
        let name = parameter.required("name")?.to_string();
        let value = if parameter.attribute("type") == Some("collection") {
            ParameterValue::Collection(decode_parameters(parameter)?)
        } else {
            ParameterValue::Scalar(parameter.required("value")?.to_string())
        };
        parameters.insert(name, value);
    }
    Ok(parameters)
}

fn decode_error(element: &Element) -> Result<ErrorRecord, SerializeError> {
    let message = match element.text() {
        "" => element.attribute("message").unwrap_or_default(),
        text => text,
    };
    Ok(ErrorRecord::new(element.required("exception-class")?, message)
        .with_code(element.parse_optional("code")?.unwrap_or(0))
        .at(
            element.attribute("file").unwrap_or_default(),
            element.parse_optional("line")?.unwrap_or(0),
        ))
}

/// Rebuild every result kind whose fields appear on the element.
///
/// Time is mandatory; a kind with only some of its fields present is an error.
fn decode_results(element: &Element) -> Result<ResultCollection, SerializeError> {
    let mut results = ResultCollection::new();
    for kind in ResultKind::ALL {
        let present = kind
            .field_names()
            .iter()
            .any(|field| element.attribute(field).is_some());
        if !present && kind != ResultKind::Time {
            continue;
        }
        results.add(MetricResult::from_fields(kind, |field| element.attribute(field))?)?;
    }
    Ok(results)
}

fn invalid(element: &Element, attribute: &str, value: &str) -> SerializeError {
    SerializeError::InvalidAttribute {
        element: element.name().to_string(),
        attribute: attribute.to_string(),
        value: value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use revbench_model::{ComputedResult, ModelError, TimeResult};

    const DOCUMENT: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<revbench version="0.1.0">
  <suite context="nightly" date="2024-03-01T10:00:00+00:00" config-path="revbench.toml" uuid="6f1c1a7e-8a43-4a57-9d1b-1b0f2f3c4d5e">
    <env>
      <uname os="linux" arch="x86_64"/>
      <vcs system="git" branch="main"/>
    </env>
    <benchmark class="sorting">
      <subject name="quick">
        <group name="fast"/>
        <variant revs="1" warmup="0" sleep="5" output-time-unit="milliseconds" output-time-precision="3" retry-threshold="10">
          <parameter name="size" value="100"/>
          <parameter name="shape" type="collection">
            <parameter name="kind" value="reversed"/>
          </parameter>
          <stats mean="999"/>
          <iteration net-time="4" memory="100" z-value="0" deviation="0" rejection-count="0"/>
          <iteration net-time="8" memory="100" z-value="0" deviation="0" rejection-count="0"/>
          <iteration net-time="4" memory="100" z-value="0" deviation="0" rejection-count="0"/>
          <iteration net-time="16" memory="100" z-value="0" deviation="0" rejection-count="2"/>
        </variant>
        <variant revs="1" warmup="0">
          <error exception-class="NoiseDetected" code="0" file="src/bin/demo.rs" line="12">benchmark made noise: hi</error>
        </variant>
      </subject>
    </benchmark>
  </suite>
</revbench>"#;

    #[test]
    fn test_decode_hierarchy() {
        let collection = decode_str(DOCUMENT).unwrap();
        assert_eq!(collection.len(), 1);

        let suite = &collection.suites()[0];
        assert_eq!(suite.context(), Some("nightly"));
        assert_eq!(suite.uuid().to_string(), "6f1c1a7e-8a43-4a57-9d1b-1b0f2f3c4d5e");
        assert_eq!(suite.env().len(), 2);
        assert_eq!(suite.env()[1].get("branch"), Some("main"));

        let subject = &suite.benchmarks()[0].subjects()[0];
        assert_eq!(subject.options().groups, vec!["fast".to_string()]);
        assert_eq!(subject.options().sleep_us, 5);
        assert_eq!(subject.options().output_time_precision, Some(3));
        assert_eq!(subject.variants().len(), 2);
    }

    #[test]
    fn test_decoded_variant_recomputes_stats() {
        let collection = decode_str(DOCUMENT).unwrap();
        let variant = &collection.suites()[0].benchmarks()[0].subjects()[0].variants()[0];

        assert_eq!(variant.iterations().len(), 4);
        for iteration in variant.iterations() {
            let kinds: Vec<ResultKind> = iteration.results().kinds().collect();
            assert_eq!(kinds, vec![ResultKind::Time, ResultKind::Memory, ResultKind::Computed]);
        }

        // the stats element is ignored
        assert!((variant.stats().unwrap().mean - 8.0).abs() < 1e-12);
        assert_eq!(variant.rejects(), &[0, 2, 3]);

        let last = variant.iteration(3).unwrap();
        assert_eq!(last.deviation().unwrap(), 100.0);
        // persisted counts are kept, not incremented again
        assert_eq!(last.rejection_count(), 2);
        assert_eq!(last.results().get_as::<TimeResult>().unwrap().net_time(), 16);
    }

    #[test]
    fn test_decoded_parameters() {
        let collection = decode_str(DOCUMENT).unwrap();
        let params = collection.suites()[0].benchmarks()[0].subjects()[0].variants()[0].parameter_set();

        assert_eq!(params.get_str("size"), Some("100"));
        match params.get("shape") {
            Some(ParameterValue::Collection(values)) => {
                assert_eq!(values.get("kind"), Some(&ParameterValue::from("reversed")));
            }
            other => panic!("expected collection, got {other:?}"),
        }
    }

    #[test]
    fn test_decoded_error_stack() {
        let collection = decode_str(DOCUMENT).unwrap();
        let variant = &collection.suites()[0].benchmarks()[0].subjects()[0].variants()[1];

        let stack = variant.error_stack().unwrap();
        assert_eq!(stack.top().message, "benchmark made noise: hi");
        assert_eq!(stack.top().kind, "NoiseDetected");
        assert_eq!(stack.top().line, 12);
        assert!(matches!(variant.stats(), Err(ModelError::StatsWithErrorStack)));
    }

    #[test]
    fn test_missing_time_attribute() {
        let xml = DOCUMENT.replace(r#"net-time="8" "#, "");
        assert!(matches!(
            decode_str(&xml),
            Err(SerializeError::Model(ModelError::MissingField { .. }))
        ));
    }

    #[test]
    fn test_partial_computed_fields() {
        let xml = DOCUMENT.replace(r#"z-value="0" deviation="0" rejection-count="2""#, r#"z-value="0""#);
        assert!(decode_str(&xml).is_err());
    }

    #[test]
    fn test_bare_time_iteration() {
        let xml = DOCUMENT.replace(
            r#"net-time="16" memory="100" z-value="0" deviation="0" rejection-count="2""#,
            r#"net-time="16""#,
        );
        let collection = decode_str(&xml).unwrap();
        let variant = &collection.suites()[0].benchmarks()[0].subjects()[0].variants()[0];
        let last = variant.iteration(3).unwrap();

        assert!(last.memory().is_err());
        // computed on decode, counted once
        assert_eq!(last.results().get_as::<ComputedResult>().unwrap().rejection_count(), 1);
    }

    #[test]
    fn test_unexpected_root() {
        assert!(matches!(
            decode_str("<report/>"),
            Err(SerializeError::UnexpectedRoot(name)) if name == "report"
        ));
    }

    #[test]
    fn test_invalid_date() {
        let xml = DOCUMENT.replace("2024-03-01T10:00:00+00:00", "yesterday");
        assert!(matches!(
            decode_str(&xml),
            Err(SerializeError::InvalidAttribute { attribute, .. }) if attribute == "date"
        ));
    }
}

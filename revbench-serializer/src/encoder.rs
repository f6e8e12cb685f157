//! Suite Encoder
//!
//! Walks the suite hierarchy and emits one element per container. Every result of
//! an iteration becomes flat attributes keyed by the kind's field names.

use crate::document::Element;
use crate::error::SerializeError;
use revbench_model::{
    ErrorStack, Information, Iteration, ParameterSet, ParameterValue, Subject, Suite,
    SuiteCollection, Variant,
};
use std::collections::BTreeMap;
use std::path::Path;

/// Name of the root element holding the suites
pub const ROOT_ELEMENT: &str = "revbench";

/// Encode a collection under a `revbench` root
pub fn encode(collection: &SuiteCollection) -> Element {
    let mut root = Element::new(ROOT_ELEMENT).with_attribute("version", env!("CARGO_PKG_VERSION"));
    for suite in collection.suites() {
        root.push(encode_suite(suite));
    }
    root
}

/// Encode a collection as an XML string
pub fn encode_to_string(collection: &SuiteCollection) -> Result<String, SerializeError> {
    encode(collection).to_xml()
}

/// Encode a collection into a file, creating parent directories
pub fn encode_file(path: &Path, collection: &SuiteCollection) -> Result<(), SerializeError> {
    let xml = encode_to_string(collection)?;
    let io_err = |source| SerializeError::Io {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(io_err)?;
    }
    std::fs::write(path, xml).map_err(io_err)
}

/// Encode one suite
pub fn encode_suite(suite: &Suite) -> Element {
    let mut element = Element::new("suite");
    element.set_optional("context", suite.context());
    element.set_attribute("date", suite.date().to_rfc3339());
    element.set_optional("config-path", suite.config_path().map(|p| p.display()));
    element.set_attribute("uuid", suite.uuid());

    let mut env = Element::new("env");
    for information in suite.env() {
        env.push(encode_information(information));
    }
    element.push(env);

    for benchmark in suite.benchmarks() {
        let mut benchmark_el = Element::new("benchmark").with_attribute("class", benchmark.class());
        for subject in benchmark.subjects() {
            benchmark_el.push(encode_subject(subject));
        }
        element.push(benchmark_el);
    }
    element
}

fn encode_information(information: &Information) -> Element {
    let mut element = Element::new(information.name());
    for (key, value) in information.iter() {
        element.set_attribute(key, value);
    }
    element
}

fn encode_subject(subject: &Subject) -> Element {
    let mut element = Element::new("subject").with_attribute("name", subject.name());
    for group in &subject.options().groups {
        element.push(Element::new("group").with_attribute("name", group));
    }
    for variant in subject.variants() {
        element.push(encode_variant(subject, variant));
    }
    element
}

fn encode_variant(subject: &Subject, variant: &Variant) -> Element {
    let options = subject.options();
    let mut element = Element::new("variant")
        .with_attribute("revs", variant.revolutions())
        .with_attribute("warmup", variant.warmup())
        .with_attribute("sleep", options.sleep_us);
    element.set_optional("output-time-unit", options.output_time_unit.as_deref());
    element.set_optional("output-time-precision", options.output_time_precision);
    element.set_optional("output-mode", options.output_mode.as_deref());
    element.set_optional("retry-threshold", variant.retry_threshold());

    encode_parameters(&mut element, variant.parameter_set());

    if let Some(stack) = variant.error_stack() {
        encode_errors(&mut element, stack);
        return element;
    }

    if let Ok(stats) = variant.stats() {
        let mut stats_el = Element::new("stats");
        for (name, value) in stats.named_values() {
            stats_el.set_attribute(name, value);
        }
        element.push(stats_el);
    }

    for iteration in variant.iterations() {
        if let Some(iteration_el) = encode_iteration(iteration) {
            element.push(iteration_el);
        }
    }
    element
}

fn encode_parameters(parent: &mut Element, parameters: &ParameterSet) {
    for (name, value) in parameters.iter() {
        parent.push(encode_parameter(name, value));
    }
}

fn encode_parameter(name: &str, value: &ParameterValue) -> Element {
    let element = Element::new("parameter").with_attribute("name", name);
    match value {
        ParameterValue::Scalar(value) => element.with_attribute("value", value),
        ParameterValue::Collection(values) => encode_collection(element, values),
    }
}

fn encode_collection(mut element: Element, values: &BTreeMap<String, ParameterValue>) -> Element {
    element.set_attribute("type", "collection");
    for (name, value) in values {
        element.push(encode_parameter(name, value));
    }
    element
}

fn encode_errors(parent: &mut Element, stack: &ErrorStack) {
    for error in stack.errors() {
        let mut element = Element::new("error")
            .with_attribute("exception-class", &error.kind)
            .with_attribute("code", error.code)
            .with_attribute("file", &error.file)
            .with_attribute("line", error.line);
        element.set_text(error.message.as_str());
        parent.push(element);
    }
}

// iterations that never produced results are not persisted
fn encode_iteration(iteration: &Iteration) -> Option<Element> {
    if iteration.results().is_empty() {
        return None;
    }
    let mut element = Element::new("iteration");
    for result in iteration.results() {
        for (field, value) in result.fields() {
            element.set_attribute(field, value);
        }
    }
    Some(element)
}

#[cfg(test)]
mod tests {
    use super::*;
    use revbench_model::{
        ErrorRecord, MemoryResult, MetricResult, ResultCollection, SubjectOptions, TimeResult,
    };

    #[test]
    fn test_iteration_attributes_are_flat() {
        let mut suite = Suite::new(None, None);
        let subject = suite
            .create_benchmark("sorting")
            .create_subject("quick", SubjectOptions::default());
        let variant = subject.create_variant(ParameterSet::new(0), 2, 0).unwrap();
        variant
            .create_iteration(
                ResultCollection::from_results([
                    MetricResult::from(TimeResult::new(10)),
                    MetricResult::from(MemoryResult::new(64)),
                ])
                .unwrap(),
            )
            .unwrap();
        variant.compute_stats();

        let suite_el = encode_suite(&suite);
        let variant_el = suite_el.children_named("benchmark").next().unwrap().children()[0].children()[0].clone();
        let iteration = variant_el.child("iteration").unwrap();

        assert_eq!(iteration.attribute("net-time"), Some("10"));
        assert_eq!(iteration.attribute("memory"), Some("64"));
        assert_eq!(iteration.attribute("z-value"), Some("0"));
        assert_eq!(iteration.attribute("deviation"), Some("0"));
        assert_eq!(iteration.attribute("rejection-count"), Some("0"));
        assert_eq!(variant_el.child("stats").unwrap().attribute("mean"), Some("5"));
        assert_eq!(variant_el.attribute("retry-threshold"), None);
    }

    #[test]
    fn test_error_variant_has_no_iterations() {
        let mut suite = Suite::new(None, None);
        let subject = suite
            .create_benchmark("b")
            .create_subject("s", SubjectOptions::default());
        let variant = subject.create_variant(ParameterSet::new(0), 1, 0).unwrap();
        variant
            .set_error_stack(ErrorRecord::new("NoiseDetected", "hello").at("src/lib.rs", 4).into())
            .unwrap();

        let suite_el = encode_suite(&suite);
        let variant_el = &suite_el.children_named("benchmark").next().unwrap().children()[0].children()[0];
        let error = variant_el.child("error").unwrap();

        assert_eq!(error.text(), "hello");
        assert_eq!(error.attribute("exception-class"), Some("NoiseDetected"));
        assert_eq!(error.attribute("line"), Some("4"));
        assert!(variant_el.child("iteration").is_none());
        assert!(variant_el.child("stats").is_none());
    }

    #[test]
    fn test_nested_parameters() {
        let mut inner = BTreeMap::new();
        inner.insert("depth".to_string(), ParameterValue::from("2"));
        let params = ParameterSet::new(0)
            .with("size", "10")
            .with("tree", ParameterValue::Collection(inner));

        let mut parent = Element::new("variant");
        encode_parameters(&mut parent, &params);

        let tree = parent
            .children_named("parameter")
            .find(|p| p.attribute("name") == Some("tree"))
            .unwrap();
        assert_eq!(tree.attribute("type"), Some("collection"));
        assert_eq!(tree.children()[0].attribute("value"), Some("2"));
    }
}

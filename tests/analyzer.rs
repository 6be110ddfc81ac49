use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use serde_json::json;
use shimmyvars::ast::Template;
use shimmyvars::{
    Analyzer, Environment, Error, FileSystemLoader, InferOptions, LoadError, MemoryLoader,
    RequirementTree, TemplateParser,
};

fn tree(value: serde_json::Value) -> RequirementTree {
    serde_json::from_value(value).unwrap()
}

/// Wraps an [`Environment`] and counts how often templates are parsed.
struct CountingParser {
    inner: Environment<MemoryLoader>,
    parses: AtomicUsize,
}

impl CountingParser {
    fn new(loader: MemoryLoader) -> Self {
        Self {
            inner: Environment::new(loader),
            parses: AtomicUsize::new(0),
        }
    }

    fn parses(&self) -> usize {
        self.parses.load(Ordering::SeqCst)
    }
}

impl TemplateParser for CountingParser {
    type Node = Template;
    type Error = Error;

    fn parse(&self, name: &str) -> Result<Template, Error> {
        self.parses.fetch_add(1, Ordering::SeqCst);
        self.inner.parse(name)
    }
}

const PRODUCT_LIST: &str = "\
{% for product in shop.products %}\
  {{ product.title }}: {{ product.price.amount }} {{ currency }}\
{% else %}\
  {{ empty_message }}\
{% endfor %}";

#[test]
fn variables_are_memoized_per_template() {
    let loader = MemoryLoader::new()
        .with("list", PRODUCT_LIST)
        .with("other", "{{ x }}");
    let analyzer = Analyzer::new(CountingParser::new(loader));

    let first = analyzer.variables("list").unwrap();
    let second = analyzer.variables("list").unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(analyzer.parser().parses(), 1);

    assert_eq!(
        *first,
        tree(json!({
            "shop": {"products": {"title": {}, "price": {"amount": {}}}},
            "currency": {},
            "empty_message": {}
        }))
    );

    // lookups reuse the cached tree
    assert_eq!(
        analyzer.lookup("list", "shop").unwrap(),
        Some(tree(json!({"products": {"title": {}, "price": {"amount": {}}}})))
    );
    assert_eq!(analyzer.lookup("list", "missing").unwrap(), None);
    assert_eq!(analyzer.parser().parses(), 1);

    analyzer.variables("other").unwrap();
    assert_eq!(analyzer.parser().parses(), 2);
    assert_eq!(analyzer.cached_names(), vec!["list".to_string(), "other".to_string()]);
}

#[test]
fn forget_forces_a_reparse() {
    let analyzer = Analyzer::new(CountingParser::new(MemoryLoader::new().with("t", "{{ a }}")));
    analyzer.variables("t").unwrap();
    assert!(analyzer.forget("t"));
    assert!(!analyzer.is_cached("t"));
    analyzer.variables("t").unwrap();
    assert_eq!(analyzer.parser().parses(), 2);
}

#[test]
fn concurrent_first_requests_parse_once() {
    let analyzer = Analyzer::new(CountingParser::new(
        MemoryLoader::new().with("list", PRODUCT_LIST),
    ));

    let results: Vec<Arc<RequirementTree>> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..8)
            .map(|_| scope.spawn(|| analyzer.variables("list").unwrap()))
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert_eq!(analyzer.parser().parses(), 1);
    assert!(results.windows(2).all(|pair| pair[0] == pair[1]));
}

#[test]
fn failures_are_reported_and_retried() {
    let loader = MemoryLoader::new().with("broken", "{% for x in items %}{{ x.y }}");
    let analyzer = Analyzer::new(CountingParser::new(loader));

    assert!(matches!(
        analyzer.variables("broken"),
        Err(Error::Parse { ref name, .. }) if name == "broken"
    ));
    assert!(matches!(
        analyzer.lookup("ghost", "a"),
        Err(Error::Load(LoadError::NotFound { ref name })) if name == "ghost"
    ));
    assert!(!analyzer.is_cached("broken"));

    assert!(analyzer.variables("broken").is_err());
    assert_eq!(analyzer.parser().parses(), 3);
}

#[test]
fn templates_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(dir.path().join("mail")).unwrap();
    std::fs::write(
        dir.path().join("mail/order.twig"),
        "Dear {{ customer.first_name }},\n\
         {% for line in order.lines %}{{ line.qty }} x {{ line.item.name }}\n{% endfor %}\
         {{ _self }}{{ signature }}",
    )
    .unwrap();

    let options = InferOptions::default().with_reserved(["signature"]);
    let analyzer = Analyzer::with_options(
        Environment::new(FileSystemLoader::new(dir.path())),
        options,
    );

    assert_eq!(
        analyzer.variables("mail/order.twig").unwrap().paths(),
        [
            "customer.first_name",
            "order.lines.item.name",
            "order.lines.qty",
        ]
    );
    assert!(matches!(
        analyzer.variables("../outside.twig"),
        Err(Error::Load(LoadError::NotFound { .. }))
    ));
}

#[test]
fn options_file_feeds_the_analyzer() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("shimmyvars.toml");
    std::fs::write(&config, "reserved = [\"loop\", \"site\"]\n").unwrap();

    let options = InferOptions::load(&config).unwrap();
    let analyzer = Analyzer::with_options(
        Environment::new(MemoryLoader::new().with("page", "{{ site.title }}{{ page.body }}")),
        options,
    );
    assert_eq!(analyzer.variables("page").unwrap().paths(), ["page.body"]);
    assert!(analyzer.options().is_reserved("site"));
    assert!(!analyzer.options().is_reserved("_self"));
}

//! End-to-end tests for `ElementFinder`: loading, querying, nested finders,
//! element handles and copy-on-modify.

#![allow(clippy::unwrap_used)]

use elementfinder::{
    DocumentKind, ElementFinder, Error, ExpressionTranslator, FinderOptions, RemoveElements,
};
use pretty_assertions::assert_eq;
use rstest::{fixture, rstest};

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

const TEST_PAGE: &str = r#"<!DOCTYPE html>
<html>
<head>
<title>test doc</title>
</head>
<body>
<div class="spans">
<span class="span-1"><b>1 </b></span>
<span>2</span>
<span class="span-3">3</span>
<span>4</span>
</div>
<table><tr><td>custom <a href="http://funivan.com/" title="my blog">link</a></td></tr></table>
</body>
</html>
"#;

const DATA_PAGE: &str = "<!DOCTYPE html>
<html>
<head><title>contacts</title></head>
<body>
<div id=\"contacts\"><span>tel: 38-097-123-45-67</span>
office: 044-222-33-44
</div>
</body>
</html>
";

const MENU_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
      <breakfast_menu>
          <food>
              <name>Belgian Waffles</name>
              <price value="$5.95"/>
              <description>Two of our famous Belgian Waffles with plenty of real maple syrup</description>
              <calories>650</calories>
          </food>
          <food>
              <name>Strawberry Belgian Waffles</name>
              <price value="$7.95"/>
              <description>Light Belgian waffles covered with strawberries and whipped cream</description>
              <calories>900</calories>
          </food>
          <food>
              <name>Berry-Berry Belgian Waffles</name>
              <price value="$8.95"/>
              <description>Light Belgian waffles covered with an assortment of fresh berries and whipped cream</description>
              <calories>900</calories>
          </food>
          <food>
              <name>French Toast</name>
              <price value="$4.50"/>
              <description>Thick slices made from our homemade sourdough bread</description>
              <calories>600</calories>
          </food>
          <food>
              <name>Homestyle Breakfast</name>
              <price value="$6.95"/>
              <description>Two eggs, bacon or sausage, toast, and our ever-popular hash browns</description>
              <calories>950</calories>
          </food>
      </breakfast_menu>
      "#;

#[fixture]
fn test_page() -> ElementFinder {
    ElementFinder::new(TEST_PAGE).unwrap()
}

#[fixture]
fn data_page() -> ElementFinder {
    ElementFinder::new(DATA_PAGE).unwrap()
}

#[fixture]
fn menu() -> ElementFinder {
    ElementFinder::with_kind(MENU_XML, DocumentKind::Xml).unwrap()
}

/// Looks items up by class name: `link` becomes `//*[@class="link"]`.
struct ItemsByClass;

impl ExpressionTranslator for ItemsByClass {
    fn translate(&self, expression: &str) -> Result<String, Error> {
        Ok(format!("//*[@class=\"{expression}\"]"))
    }
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

#[rstest]
fn test_load(test_page: ElementFinder) {
    let content = test_page.content(".").unwrap();
    assert!(content.first().unwrap().unwrap().contains("<title>test doc</title>"));
}

#[test]
fn test_load_empty_document() {
    assert_eq!(ElementFinder::new("").unwrap_err(), Error::EmptySource);
    assert_eq!(
        ElementFinder::with_kind("", DocumentKind::Xml).unwrap_err(),
        Error::EmptySource
    );
}

#[rstest]
#[case("html", Ok(DocumentKind::Html))]
#[case("HTML", Ok(DocumentKind::Html))]
#[case("xml", Ok(DocumentKind::Xml))]
#[case("-1", Err(Error::InvalidDocumentKind("-1".into())))]
#[case("", Err(Error::InvalidDocumentKind(String::new())))]
fn test_document_kind_from_str(#[case] input: &str, #[case] expected: Result<DocumentKind, Error>) {
    assert_eq!(input.parse::<DocumentKind>(), expected);
}

#[test]
fn test_load_document_with_zero() {
    let finder = ElementFinder::new("   0 ").unwrap();
    assert_eq!(
        finder.content(".").unwrap().first().unwrap().unwrap(),
        "<body><p>0 </p></body>"
    );
}

#[test]
fn test_valid_document_type() {
    let doc = ElementFinder::with_kind("<xml><list>123</list></xml>", DocumentKind::Xml).unwrap();
    let content = doc.content(".").unwrap();
    assert!(content.first().unwrap().unwrap().contains("<list>123</list>"));
}

#[test]
fn test_non_ascii_text_survives_html_loading() {
    let finder = ElementFinder::new("<p>\u{41f}\u{440}\u{438}\u{432}\u{435}\u{442} &amp; caf\u{e9}</p>").unwrap();
    assert_eq!(
        finder.value("//p").unwrap().all().unwrap(),
        ["\u{41f}\u{440}\u{438}\u{432}\u{435}\u{442} & caf\u{e9}"]
    );
    assert_eq!(
        finder.content("//body").unwrap().first().unwrap().unwrap(),
        "<p>\u{41f}\u{440}\u{438}\u{432}\u{435}\u{442} &amp; caf\u{e9}</p>"
    );
}

// ---------------------------------------------------------------------------
// Load errors
// ---------------------------------------------------------------------------

#[rstest]
fn test_valid_html_has_no_load_errors(data_page: ElementFinder) {
    assert!(data_page.load_errors().is_empty());
}

#[test]
fn test_invalid_html_reports_one_error() {
    let finder = ElementFinder::new(
        "
        <!DOCTYPE html>
        <html>
          <head></head>
          <body>
            <span></span></span>
          </body>
        </html>
      ",
    )
    .unwrap();
    let errors = finder.load_errors();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].message.contains("Unexpected end tag : span"));
    assert_eq!(errors[0].line(), 6);
}

#[rstest]
fn test_valid_xml_has_no_load_errors(menu: ElementFinder) {
    assert!(menu.load_errors().is_empty());
}

#[rstest]
#[case::tag_mismatch(
    r#"<?xml version="1.0" encoding="UTF-8"?>
      <note>
        <to>Tove</to>
        <from>Jani</Ffrom>
          <heading>Reminder</heading>
          <body>Don't forget me this weekend!</body>
      </note>
      "#,
    "Opening and ending tag mismatch: from"
)]
#[case::two_roots(
    r#"<?xml version="1.0" encoding="UTF-8"?>
      <note>
        <to>Tove</to>
        <from>Jani</from>
      </note>
      <note>
        <to>John</to>
        <from>Doe</from>
      </note>
      "#,
    "Extra content at the end of the document"
)]
fn test_invalid_xml_reports_one_error(#[case] xml: &str, #[case] message: &str) {
    let finder = ElementFinder::with_kind(xml, DocumentKind::Xml).unwrap();
    let errors = finder.load_errors();
    assert_eq!(errors.len(), 1, "{errors:?}");
    assert!(errors[0].message.contains(message), "{}", errors[0].message);
}

#[test]
fn test_recovered_xml_is_still_queryable() {
    let finder = ElementFinder::with_kind(
        "<note><to>Tove</to><from>Jani</Ffrom><body>x</body></note>",
        DocumentKind::Xml,
    )
    .unwrap();
    assert_eq!(finder.value("//to").unwrap().all().unwrap(), ["Tove"]);
    assert_eq!(finder.value("//body").unwrap().all().unwrap(), ["x"]);
}

// ---------------------------------------------------------------------------
// Content and values
// ---------------------------------------------------------------------------

#[rstest]
fn test_attributes(test_page: ElementFinder) {
    assert_eq!(test_page.value("//a/@href").unwrap().count().unwrap(), 1);
    let outer = test_page.outer_content("//a").unwrap();
    assert_eq!(
        outer.first().unwrap().unwrap(),
        r#"<a href="http://funivan.com/" title="my blog">link</a>"#
    );
}

#[rstest]
fn test_html_selector(test_page: ElementFinder) {
    let cells = test_page.content("//td").unwrap();
    assert_eq!(cells.count().unwrap(), 1);
    assert_eq!(cells.get(10).unwrap(), None);
    assert_eq!(
        cells.get(0).unwrap().unwrap(),
        r#"custom <a href="http://funivan.com/" title="my blog">link</a>"#
    );
    assert_eq!(test_page.content("//td/@df").unwrap().get(0).unwrap(), None);
}

#[rstest]
fn test_attribute_content_is_escaped_value(test_page: ElementFinder) {
    let finder = ElementFinder::new(r#"<a title="a &amp; b">x</a>"#).unwrap();
    assert_eq!(finder.content("//a/@title").unwrap().all().unwrap(), ["a &amp; b"]);
    assert_eq!(
        finder.outer_content("//a/@title").unwrap().all().unwrap(),
        [r#"title="a &amp; b""#]
    );
    assert_eq!(test_page.value("//a/@title").unwrap().all().unwrap(), ["my blog"]);
}

#[test]
fn test_fetch_text_nodes() {
    let finder = ElementFinder::new(
        "
        <div>
          <ul>
            <li><b>param1:</b>t1<span>or</span>t2</li>
            <li><b>param2:</b>other</li>
            <li>param3: new</li>
          </ul>
        </div>
      ",
    )
    .unwrap();
    let first = finder.value("//b/following-sibling::text()[1]").unwrap();
    assert_eq!(first.all().unwrap(), ["t1", "other"]);
    let all = finder.value("//b/following-sibling::text()").unwrap();
    assert_eq!(all.all().unwrap(), ["t1", "t2", "other"]);
}

#[test]
fn test_all_nodes_between_siblings() {
    let finder = ElementFinder::new(
        "
        <html>
          <h2>Title1</h2>
            <p>Text 1</p>
          <h2>Title2</h2>
            <p>Text 2</p>
          <h2>Title3</h2>
            <p>Text 3</p>
          <h2>Title4</h2>
            <p>Text 4</p>
          <h2>Title5</h2>
        </html>
      ",
    )
    .unwrap();
    let ns1 = "//*/h2[1]/following-sibling::p";
    let ns2 = "//*/h2[count(//h2)]/preceding-sibling::p";
    let result = finder
        .value(&format!("{ns1}[count(.|{ns2}) = count({ns2})]"))
        .unwrap();
    assert_eq!(result.all().unwrap(), ["Text 1", "Text 2", "Text 3", "Text 4"]);
}

#[test]
fn test_key_value() {
    let finder = ElementFinder::new(
        "
        <table>
          <tbody>
          <tr><td>Year</td><td>2016</td></tr>
          <tr><td>Make</td><td>CAT</td></tr>
          <tr><td>Model</td><td>560G</td></tr>
          </tbody>
        </table>
      ",
    )
    .unwrap();
    let values = finder.key_value("//table//td[1]", "//table//td[2]").unwrap();
    let pairs: Vec<_> = values.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect();
    assert_eq!(pairs, [("Year", "2016"), ("Make", "CAT"), ("Model", "560G")]);
}

#[test]
fn test_key_value_fail() {
    let finder = ElementFinder::new(
        "
        <table>
          <tbody>
          <tr><td>Year</td><td>2016</td></tr>
          <tr><td>Make</td><td>CAT</td></tr>
          <tr><td>560G</td></tr>
          </tbody>
        </table>
      ",
    )
    .unwrap();
    let err = finder.key_value("//table//td[1]", "//table//td[2]").unwrap_err();
    assert_eq!(err, Error::CardinalityMismatch { keys: 3, values: 2 });
    assert!(err
        .to_string()
        .starts_with("Keys and values must have equal numbers of elements"));
}

#[rstest]
fn test_match(data_page: ElementFinder) {
    let regex = "!([\\d-]+)[<|\\n]!";
    let content = data_page.content(".").unwrap();

    let phones = content.matches(regex).unwrap();
    assert_eq!(phones.all().unwrap(), ["38-097-123-45-67", "044-222-33-44"]);

    let whole = content.match_all(regex, 0).unwrap();
    assert_eq!(whole.count().unwrap(), 2);
    assert!(whole.get(0).unwrap().unwrap().contains('<'));
    assert!(whole.get(1).unwrap().unwrap().contains('\n'));

    assert!(content.match_all(regex, 4).unwrap().is_empty().unwrap());
    assert!(content.matches("!(1233)!").unwrap().is_empty().unwrap());
}

#[test]
fn test_invalid_expression_is_an_error() {
    let finder = ElementFinder::new("<p>x</p>").unwrap();
    assert!(matches!(finder.value("//p[@"), Err(Error::XPath { .. })));
    assert!(matches!(finder.value("nope(1)"), Err(Error::XPath { .. })));
}

// ---------------------------------------------------------------------------
// XML documents
// ---------------------------------------------------------------------------

#[rstest]
fn test_xml_data(menu: ElementFinder) {
    assert_eq!(menu.object("//food").unwrap().count().unwrap(), 5);

    let menu = menu.remove("//food[3]").unwrap();
    assert_eq!(menu.object("//food").unwrap().count().unwrap(), 4);
    assert_eq!(
        menu.value("//food[1]/price/@value").unwrap().first().unwrap().unwrap(),
        "$5.95"
    );
    assert_eq!(menu.value("//food/calories").unwrap().last().unwrap().unwrap(), "950");
    assert_eq!(
        menu.content("//food[2]/calories").unwrap().first().unwrap().unwrap(),
        "900"
    );

    let usd = menu
        .content(".")
        .unwrap()
        .matches("!<price value=\"([^\"]+)\"!iu")
        .unwrap()
        .replace("!^\\$(.+)!iu", "$1 USD")
        .unwrap();
    assert_eq!(usd.first().unwrap().unwrap(), "5.95 USD");
    assert_eq!(usd.count().unwrap(), 4);
}

#[rstest]
fn test_xml_root_node(menu: ElementFinder) {
    let foods = menu.object("//food").unwrap();
    let third = foods.get(2).unwrap().unwrap();
    assert_eq!(third.value("/root/calories").unwrap().first().unwrap().unwrap(), "900");
    assert_eq!(third.kind(), DocumentKind::Xml);
}

// ---------------------------------------------------------------------------
// Nested finders
// ---------------------------------------------------------------------------

#[rstest]
fn test_objects_and_remove(test_page: ElementFinder) {
    assert_eq!(test_page.object("//span").unwrap().count().unwrap(), 4);

    let page = test_page.remove("//span[2]").unwrap();
    assert_eq!(page.content("//span").unwrap().count().unwrap(), 3);

    let classed = page.value("//span[@class]").unwrap().count().unwrap();
    let page = page.remove("//span[@class]").unwrap();
    assert_eq!(page.content("//span").unwrap().count().unwrap(), 3 - classed);
    assert_eq!(page.value("//span").unwrap().all().unwrap(), ["4"]);
}

#[rstest]
fn test_object_with_outer_html(test_page: ElementFinder) {
    let spans = test_page.outer_object("//span").unwrap();
    assert_eq!(spans.count().unwrap(), 4);
    let first = spans.get(0).unwrap().unwrap();
    let content = first.content(".").unwrap();
    assert!(content.first().unwrap().unwrap().contains(r#"<span class="span-1">"#));
}

#[rstest]
fn test_object_with_inner_content(test_page: ElementFinder) {
    let spans = test_page.object("//span").unwrap();
    let first = spans.get(0).unwrap().unwrap();
    let content = first.content(".").unwrap();
    let markup = content.first().unwrap().unwrap();
    assert!(!markup.contains(r#"<span class="span-1">"#));
    assert!(markup.contains("<b>1 </b>"));
}

#[test]
fn test_object_with_empty_html() {
    let page = ElementFinder::new("<div></div><div><a>df</a></div>").unwrap();
    let objects = page.object("//div").unwrap();

    let empty = objects.get(0).unwrap().unwrap();
    assert_eq!(empty.content(".").unwrap().first().unwrap().unwrap(), "");
    assert!(empty
        .content("/")
        .unwrap()
        .get(0)
        .unwrap()
        .unwrap()
        .contains("data-document-is-empty"));

    let full = objects.get(1).unwrap().unwrap();
    assert!(!full.content(".").unwrap().first().unwrap().unwrap().is_empty());
    assert_eq!(full.value("//a").unwrap().get(0).unwrap().unwrap(), "df");
}

#[test]
fn test_share_expression_translator() {
    let page = ElementFinder::with_options(
        r##"
          <div class="node">
            <a href="#" class="link">test0</a>
          </div>
          <div class="node">
            <a href="#" class="link">test1</a>
          </div>
          <div class="node">
            <a href="#" class="link">test2</a>
          </div>
"##,
        FinderOptions::default().translator(ItemsByClass),
    )
    .unwrap();

    let objects = page.object("node").unwrap();
    assert_eq!(objects.count().unwrap(), 3);
    for (index, object) in objects.iter().unwrap().enumerate() {
        let link = object.content("link").unwrap();
        assert_eq!(link.count().unwrap(), 1);
        assert_eq!(link.first().unwrap().unwrap(), &format!("test{index}"));
    }
}

#[test]
fn test_object_content_round_trips() {
    let page = ElementFinder::new(r#"<div id="a"><p>one</p><p>two <i>2</i></p></div>"#).unwrap();
    let markup = page.content("//div").unwrap();
    let objects = page.object("//div").unwrap();
    let nested = objects.first().unwrap().unwrap();
    assert_eq!(
        nested.content("//body").unwrap().first().unwrap(),
        markup.first().unwrap()
    );
}

#[rstest]
#[case::named_like_value(r#"<input type="text" name="name">"#, "//input", r#"<input type="text" name="name">"#)]
#[case::title(r#"<a title="title">x</a>"#, "//a", r#"<a title="title">x</a>"#)]
#[case::boolean(r#"<input type="checkbox" checked="checked">"#, "//input", r#"<input type="checkbox" checked>"#)]
fn test_outer_content_keeps_attribute_values(
    #[case] html: &str,
    #[case] expression: &str,
    #[case] expected: &str,
) {
    let page = ElementFinder::new(html).unwrap();
    assert_eq!(page.outer_content(expression).unwrap().all().unwrap(), [expected]);
}

#[test]
fn test_object_keeps_non_breaking_space() {
    let page = ElementFinder::new("<div>&nbsp;</div>").unwrap();
    let nested = page.object("//div").unwrap().into_items().unwrap().remove(0);
    assert_eq!(nested.value("//body").unwrap().all().unwrap(), ["\u{a0}"]);
}

// ---------------------------------------------------------------------------
// Copy-on-modify
// ---------------------------------------------------------------------------

#[test]
fn test_modify() {
    let page = ElementFinder::new("<html><span>user</span></html>").unwrap();
    assert_eq!(page.value("//span").unwrap().count().unwrap(), 1);
    let clean = page.modify("//span", &RemoveElements).unwrap();
    assert_eq!(page.value("//span").unwrap().count().unwrap(), 1);
    assert_eq!(clean.value("//span").unwrap().count().unwrap(), 0);
}

#[rstest]
fn test_delete_node(test_page: ElementFinder) {
    let _ = test_page.remove("//title").unwrap();
    assert!(test_page.value("//title").unwrap().first().unwrap().is_some());

    let page = test_page.remove("//title").unwrap();
    assert!(page.value("//title").unwrap().first().unwrap().is_none());
}

#[rstest]
fn test_delete_attribute(test_page: ElementFinder) {
    let _ = test_page.remove("//a/@title").unwrap();
    assert!(test_page.value("//a/@title").unwrap().first().unwrap().is_some());

    let page = test_page.remove("//a/@title").unwrap();
    assert!(page.value("//a/@title").unwrap().first().unwrap().is_none());
    assert_eq!(page.value("//a/@href").unwrap().count().unwrap(), 1);
}

#[test]
fn test_modified_copy_keeps_load_errors() {
    let page = ElementFinder::new("<body><span></span></span></body>").unwrap();
    let copy = page.remove("//span").unwrap();
    assert_eq!(copy.load_errors(), page.load_errors());
}

// ---------------------------------------------------------------------------
// Element handles
// ---------------------------------------------------------------------------

#[test]
fn test_element() {
    let page = ElementFinder::new(r#"<div><span title="Hello">sdf</span></div>"#).unwrap();

    let elements = page.element("//span").unwrap();
    let mut first = elements.first().unwrap().unwrap().clone();
    first.set_attribute("title", "Changed");
    assert_eq!(first.attribute("title"), Some("Changed"));

    let again = page.element("//span").unwrap();
    let second = again.first().unwrap().unwrap();
    assert_eq!(second.attribute("title"), Some("Hello"));
    assert_eq!(second.name().as_deref(), Some("span"));
    assert_eq!(second.text(), "sdf");
    assert_eq!(second.outer_html(), r#"<span title="Hello">sdf</span>"#);
}

#[test]
fn test_element_collection_rejects_non_elements() {
    let page = ElementFinder::new(r#"<div><span title="Hello">sdf</span></div>"#).unwrap();
    let elements = page.element("//span/@title").unwrap();
    let expected = Error::InvalidItem {
        index: 0,
        reason: "expected an element, found attribute".into(),
    };
    assert_eq!(elements.count().unwrap_err(), expected);
    assert_eq!(elements.first().unwrap_err(), expected);
}

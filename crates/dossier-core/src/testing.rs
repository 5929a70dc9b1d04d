//! Section page fixtures shared by unit tests.

use crate::document::{Document, Node, NodeId, Selector};
use crate::form::groups::{ITEM_CLASS, REMOVE_CLASS};
use crate::form::page::{PageLayout, SectionPage};
use crate::form::visibility::{Predicate, VisibilityRule};

fn section(doc: &mut Document, slug: &str) -> NodeId {
    let root = doc.root();
    doc.append(root, Node::element("section").with_id(format!("section-{slug}")))
}

fn page(slug: &str, doc: Document) -> SectionPage {
    SectionPage::setup(
        &format!("/sections/section-{slug}.html"),
        doc,
        PageLayout::questionnaire(),
    )
    .expect("fixture path is a section path")
}

/// Add one repeatable item (markup copy when `index` is a number, template
/// content when it is `#`). `fields` receives the item and the index text.
fn item(
    doc: &mut Document,
    parent: Option<NodeId>,
    template: Option<(NodeId, &str)>,
    title: &str,
    index: &str,
    fields: impl Fn(&mut Document, NodeId, &str),
) -> NodeId {
    let root = Node::element("fieldset").with_class(ITEM_CLASS);
    let item = match (parent, template) {
        (Some(parent), _) => doc.append(parent, root),
        (None, Some((section, template_id))) => doc.append_template(section, template_id, root),
        (None, None) => unreachable!("item needs a parent or a template"),
    };
    doc.append(item, Node::legend(format!("{title} {index}")));
    fields(doc, item, index);
    let mut remove = Node::button().with_class(REMOVE_CLASS);
    if index == "#" {
        remove = remove.hidden();
    }
    doc.append(item, remove);
    item
}

pub(crate) fn applicant_details_page() -> SectionPage {
    let mut doc = Document::new();
    let s = section(&mut doc, "applicant-details");
    doc.append(s, Node::label("applicant-name", "Full name"));
    doc.append(s, Node::text_input("applicant_name").with_id("applicant-name").required());
    doc.append(s, Node::text_input("email").with_id("email"));
    doc.append(s, Node::checkbox("consent").with_id("consent"));
    page("applicant-details", doc)
}

fn sibling_fields(doc: &mut Document, item: NodeId, index: &str) {
    doc.append(item, Node::label(format!("sibling-name-{index}"), "Name"));
    doc.append(
        item,
        Node::text_input(format!("sibling[{index}][name]"))
            .with_id(format!("sibling-name-{index}"))
            .required(),
    );
}

pub(crate) fn siblings_page() -> SectionPage {
    let mut doc = Document::new();
    let s = section(&mut doc, "siblings");
    let container = doc.append(s, Node::element("div").with_id("siblings-container"));
    item(&mut doc, Some(container), None, "Sibling", "1", sibling_fields);
    doc.append(s, Node::button().with_id("add-sibling"));
    item(&mut doc, None, Some((s, "sibling-template")), "Sibling", "#", sibling_fields);
    page("siblings", doc)
}

fn married_sibling_fields(doc: &mut Document, item: NodeId, index: &str) {
    sibling_fields(doc, item, index);
    doc.append(
        item,
        Node::checkbox(format!("sibling[{index}][married]")).with_class("sibling-married"),
    );
    let spouse = doc.append(item, Node::element("div").with_class("spouse-details"));
    doc.append(spouse, Node::text_input(format!("sibling[{index}][spouse]")).required());
}

/// Siblings page whose items each carry their own visibility rule.
pub(crate) fn married_siblings_page() -> SectionPage {
    let mut doc = Document::new();
    let s = section(&mut doc, "siblings");
    let container = doc.append(s, Node::element("div").with_id("siblings-container"));
    item(&mut doc, Some(container), None, "Sibling", "1", married_sibling_fields);
    doc.append(s, Node::button().with_id("add-sibling"));
    item(&mut doc, None, Some((s, "sibling-template")), "Sibling", "#", married_sibling_fields);

    let mut layout = PageLayout::questionnaire();
    layout.rules.push(VisibilityRule::new(
        Selector::class("sibling-married"),
        Selector::class("spouse-details"),
        Predicate::Checked,
    ));
    SectionPage::setup("/sections/section-siblings.html", doc, layout)
        .expect("fixture path is a section path")
}

pub(crate) fn national_service_page() -> SectionPage {
    let mut doc = Document::new();
    let s = section(&mut doc, "national-service");
    doc.append(s, Node::checkbox("ns_applicable").with_id("ns-applicable"));
    let details = doc.append(s, Node::element("div").with_id("ns-details-container"));
    doc.append(details, Node::text_input("ns_unit").with_id("ns-unit").required());
    doc.append(details, Node::text_input("ns_rank").with_id("ns-rank"));
    page("national-service", doc)
}

fn prev_marriage_fields(doc: &mut Document, item: NodeId, index: &str) {
    doc.append(
        item,
        Node::text_input(format!("prev_marriage[{index}][spouse_name]"))
            .with_id(format!("prev-marriage-spouse-{index}"))
            .required(),
    );
}

pub(crate) fn prev_marriage_page() -> SectionPage {
    let mut doc = Document::new();
    let s = section(&mut doc, "prev-marriage");
    doc.append(
        s,
        Node::checkbox("prev_marriage_applicable").with_id("prev-marriage-applicable"),
    );
    let container = doc.append(s, Node::element("div").with_id("prev-marriage-container"));
    item(&mut doc, Some(container), None, "Marriage", "1", prev_marriage_fields);
    doc.append(s, Node::button().with_id("add-prev-marriage"));
    item(
        &mut doc,
        None,
        Some((s, "prev-marriage-template")),
        "Marriage",
        "#",
        prev_marriage_fields,
    );
    page("prev-marriage", doc)
}

fn prev_child_fields(doc: &mut Document, item: NodeId, index: &str) {
    doc.append(
        item,
        Node::text_input(format!("prev_child[{index}][name]")).with_id(format!("prev-child-name-{index}")),
    );
    doc.append(item, Node::radio(format!("prev_child[{index}][employed]"), "yes"));
    doc.append(item, Node::radio(format!("prev_child[{index}][employed]"), "no"));
    let details = doc.append(item, Node::element("div").with_class("employment-details"));
    doc.append(
        details,
        Node::text_input(format!("prev_child[{index}][employer]")).required(),
    );
}

pub(crate) fn prev_children_page() -> SectionPage {
    let mut doc = Document::new();
    let s = section(&mut doc, "prev-children");
    let container = doc.append(s, Node::element("div").with_id("prev-children-container"));
    item(&mut doc, Some(container), None, "Child", "1", prev_child_fields);
    doc.append(s, Node::button().with_id("add-prev-child"));
    item(&mut doc, None, Some((s, "prev-child-template")), "Child", "#", prev_child_fields);
    page("prev-children", doc)
}

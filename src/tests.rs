use super::*;

use std::cell::RefCell;

fn run(template: &str, document: &str) -> Run {
    Template::compile(template).unwrap().run(document).unwrap()
}

/// Collect `name` every time it is captured.
fn collect(template: &str, document: &str, name: &str) -> (Run, Vec<String>) {
    let seen = RefCell::new(Vec::new());
    let template = Template::compile(template).unwrap();
    let mut dispatcher = CaptureDispatcher::new().on(name, |scope| {
        seen.borrow_mut()
            .push(scope.get(name).unwrap_or_default().to_string())
    });
    let run = template.run_with(document, &mut dispatcher).unwrap();
    drop(dispatcher);
    (run, seen.into_inner())
}

#[test]
fn test_whitespace_and_comments_are_ignored() {
    let run = run(
        "
        <html>
          <body>
            <div></div>
          </body>
        </html>
        ",
        "<html>\r\n  <body>\r\n    <!-- comment -->\r\n    <div></div>\r\n  </body>\r\n</html>",
    );
    assert!(run.is_valid());
}

const ONE_DIV: &str = "
    <html>
      <body>
        <div></div>
      </body>
    </html>
    ";

#[test]
fn test_wrapped_template_matches_bare_fragment() {
    assert!(run(ONE_DIV, "<div></div>").is_valid());
    assert!(
        run(
            "<html>\n  <body>\n    <div></div>\n    <p></p>\n  </body>\n</html>",
            "<div></div><p></p>"
        )
        .is_valid()
    );
}

#[test]
fn test_missing_sibling_is_invalid() {
    let run = run(
        "<html><body><div></div><div></div></body></html>",
        "<div></div>",
    );
    assert!(!run.is_valid());
    assert!(!run.is_partial());
}

#[test]
fn test_other_tag_is_invalid_not_partial() {
    let run = run(ONE_DIV, "<p></p>");
    assert!(!run.is_valid());
    assert!(!run.is_partial());
}

#[test]
fn test_extra_child_is_partial() {
    let run = run(ONE_DIV, "<div><p></p></div>");
    assert!(run.is_partial());
    assert_eq!(run.tail_name(), Some("p"));
}

#[test]
fn test_text_matches_without_capture() {
    let run = run(
        "<html><body><div>This is cool!</div></body></html>",
        "<div>This is cool!</div>",
    );
    assert!(run.is_valid());
    assert_eq!(run.result().capture(), None);
}

#[test]
fn test_scope_is_shared_among_siblings() {
    let run = run(
        "
        <html>
          <body>
            <p>{$var1}This is cool!{/$var1}</p>
            <p>{$var2}This is awesome!{/$var2}</p>
          </body>
        </html>
        ",
        "<p>This is cool!</p><p>This is awesome!</p>",
    );
    assert!(run.is_valid());
    assert_eq!(run.get("var1"), Some("This is cool!"));
    assert_eq!(run.get("var2"), Some("This is awesome!"));
}

#[test]
fn test_headings_and_paragraphs() {
    let template = Template::compile(
        "
        <html>
          <body>
            <h1>{$heading1}{/.*/}{/$heading1}</h1>
            <h2>{$heading2}{/.*/}{/$heading2}</h2>
            {many}
              <p>{$paragraph}{/.*/}{/$paragraph}</p>
            {/many}
          </body>
        </html>
        ",
    )
    .unwrap();
    let lines = RefCell::new(Vec::new());
    let mut dispatcher = CaptureDispatcher::new()
        .on("heading1", |scope| {
            lines.borrow_mut().push(format!("# {}", scope.get("heading1").unwrap_or_default()))
        })
        .on("heading2", |scope| {
            lines.borrow_mut().push(format!("## {}", scope.get("heading2").unwrap_or_default()))
        })
        .on("paragraph", |scope| {
            lines.borrow_mut().push(scope.get("paragraph").unwrap_or_default().to_string())
        });
    let run = template
        .run_with(
            "
            <h1>This is awesome!</h1>
            <h2>Do we have something to say?</h2>
            <p>Lorem ipsum dolor sit amet.</p>
            <p>Duis pellentesque purus a urna.</p>
            ",
            &mut dispatcher,
        )
        .unwrap();
    drop(dispatcher);
    assert!(run.is_valid(), "{}", run.verdict());
    assert_eq!(
        lines.into_inner(),
        [
            "# This is awesome!",
            "## Do we have something to say?",
            "Lorem ipsum dolor sit amet.",
            "Duis pellentesque purus a urna.",
        ]
    );
}

#[test]
fn test_html_entities_reach_captures_decoded() {
    let (run, seen) = collect("<p>{$t}{/.*/}{/$t}</p>", "<p>caf&eacute;&nbsp;&amp; bar</p>", "t");
    assert!(run.is_valid());
    assert_eq!(seen, ["café\u{a0}& bar"]);
}

#[test]
fn test_regex_capture_reaches_handler() {
    let (run, seen) = collect("<p>\n  {$var1}{/[0-9]+/}{/$var1}\n</p>", "<p>42</p>", "var1");
    assert!(run.is_valid());
    assert_eq!(run.get("var1"), Some("42"));
    assert_eq!(seen, ["42"]);
}

#[test]
fn test_regex_capture_spans_line_breaks() {
    let (run, seen) = collect(
        "<body><p>{$var1}{/.*/}{/$var1}</p></body>",
        "<body><p>This<br />is<br />awesome!</p></body>",
        "var1",
    );
    assert!(run.is_valid());
    assert_eq!(seen, ["This\nis\nawesome!"]);
}

#[test]
fn test_empty_capture_is_valid() {
    let (run, seen) = collect("<body>{$var1}{/.*/}{/$var1}</body>", "<body></body>", "var1");
    assert!(run.is_valid());
    assert_eq!(seen, [""]);
}

#[test]
fn test_captures_inside_alternative_are_visible_afterwards() {
    let template = Template::compile(
        "<body>
           {either}
             <p>{$var1}{/.*/}{/$var1}</p>
           {or}
             <div>{$var1}{/.*/}{/$var1}</div>
           {/either}
           <span>{$var2}{/.*/}{/$var2}</span>
         </body>",
    )
    .unwrap();
    let mut var1 = None;
    let mut dispatcher = CaptureDispatcher::new().on("var2", |scope| {
        var1 = scope.get("var1").map(str::to_string);
    });
    let run = template
        .run_with(
            "<body><p>This is a text</p><span>This is some other text</span></body>",
            &mut dispatcher,
        )
        .unwrap();
    drop(dispatcher);
    assert!(run.is_valid());
    assert_eq!(var1.as_deref(), Some("This is a text"));
}

#[test]
fn test_nested_captures_see_enclosing_iterations() {
    let template = Template::compile(
        "<html>
           <body>
             {many}
               <h1>{$heading}{/.*/}{/$heading}</h1>
               {many}
                 <h2>{$subheading}{/.*/}{/$subheading}</h2>
               {/many}
             {/many}
           </body>
         </html>",
    )
    .unwrap();
    let mut pairs = Vec::new();
    let mut dispatcher = CaptureDispatcher::new().on("subheading", |scope| {
        pairs.push(format!(
            "{}/{}",
            scope.get("heading").unwrap_or("?"),
            scope.get("subheading").unwrap_or("?")
        ));
    });
    let run = template
        .run_with(
            "<html>
               <body>
                 <h1>1</h1>
                 <h2>1.1</h2>
                 <h2>1.2</h2>
                 <h1>2</h1>
                 <h2>2.1</h2>
                 <h2>2.2</h2>
               </body>
             </html>",
            &mut dispatcher,
        )
        .unwrap();
    drop(dispatcher);
    assert!(run.is_valid());
    assert_eq!(pairs, ["1/1.1", "1/1.2", "2/2.1", "2/2.2"]);
    assert_eq!(run.get("heading"), None);
}

#[test]
fn test_partial_result_reports_tail() {
    let run = run(
        "<html><body>{many}<span></span>{/many}</body></html>",
        "<html><body><span></span><span></span><p></p></body></html>",
    );
    assert!(run.is_partial());
    assert_eq!(run.tail_name(), Some("p"));
    assert_eq!(run.verdict(), "partial at <p>");
}

#[test]
fn test_verdicts() {
    assert_eq!(run("<div></div>", "<div></div>").verdict(), "valid");
    assert_eq!(run("<div></div>", "<p></p>").verdict(), "invalid");
    assert_eq!(
        run("<div></div><p></p>", "<div><em></em></div><p></p>").verdict(),
        "partial at <em>"
    );
    assert_eq!(
        run("{either}<p></p>{or}<div></div>{/either}", "<p><b></b></p>").verdict(),
        "invalid (template ran out before <b>)"
    );
}

#[test]
fn test_run_is_deterministic() {
    let template = Template::compile(
        "<body>{...}<h1>{$t}{/.*/}{/$t}</h1>{many}<p>{$p}{/.*/}{/$p}</p>{/many}</body>",
    )
    .unwrap();
    let document = "<body><nav></nav><h1>Title</h1><p>a</p><p>b</p></body>";
    let first = template.run(document).unwrap();
    let second = template.run(document).unwrap();
    assert_eq!(first.outcome, second.outcome);
    assert_eq!(first.get("t"), Some("Title"));
}

#[test]
fn test_compiling_twice_behaves_identically() {
    let source = "<body>{either}<p>{$x}{/.+/}{/$x}</p>{or}<div></div>{/either}</body>";
    let a = Template::compile(source).unwrap();
    let b = Template::compile(source).unwrap();
    assert_eq!(a, b);
    for document in ["<body><p>hi</p></body>", "<body><div></div></body>", "<body><b></b></body>"] {
        assert_eq!(a.run(document).unwrap().outcome, b.run(document).unwrap().outcome);
    }
}

#[test]
fn test_template_is_shared_across_threads() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<Template>();

    let template = Template::compile("<ul>{many}<li>{$n}{/[0-9]+/}{/$n}</li>{/many}</ul>").unwrap();
    let verdicts: Vec<bool> = std::thread::scope(|s| {
        let handles: Vec<_> = ["<ul><li>1</li><li>2</li></ul>", "<ul><li>x</li></ul>"]
            .into_iter()
            .map(|document| {
                let template = &template;
                s.spawn(move || template.run(document).unwrap().is_valid())
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });
    assert_eq!(verdicts, [true, false]);
}

#[test]
fn test_run_bytes_decodes_charset() {
    let template = Template::compile("<h4>{$section}{/SECCI[ÓO]N .+/}{/$section}</h4>").unwrap();
    let run = template
        .run_bytes(b"<h4>SECCI\xd3N II</h4>", Some("iso-8859-1"), &mut CaptureDispatcher::new())
        .unwrap();
    assert!(run.is_valid());
    assert_eq!(run.get("section"), Some("SECCIÓN II"));
}

#[test]
fn test_recipe_ingredients() {
    let template = Template::compile(
        r#"
        <div class="ingred-left">
          <h3>{$ingredients}{/.*/}{/$ingredients}</h3>
          {...}
          {many}
            <ul>
              {many}
                <li>
                  <label>
                    {...}
                    <p>
                      <span>{$amount}{/.*/}{/$amount}</span>
                      <span>{$ingredient}{/.*/}{/$ingredient}</span>
                    </p>
                  </label>
                </li>
              {/many}
            </ul>
          {/many}
          {...but}<ul>{...}</ul>{/...but}
        </div>
        "#,
    )
    .unwrap();
    let lines = RefCell::new(Vec::new());
    let mut dispatcher = CaptureDispatcher::new()
        .on("ingredients", |scope| {
            lines
                .borrow_mut()
                .push(format!("# {}:", scope.get("ingredients").unwrap_or_default()))
        })
        .on("ingredient", |scope| {
            lines.borrow_mut().push(format!(
                "- {} of {}",
                scope.get("amount").unwrap_or_default(),
                scope.get("ingredient").unwrap_or_default()
            ))
        });
    let run = template
        .run_with(
            r#"
            <div class="ingred-left">
              <h3>Ingredients</h3>
              <a href="/print">print</a>
              <ul>
                <li><label><input type="checkbox"><p><span>1 cup</span><span>white sugar</span></p></label></li>
                <li><label><input type="checkbox"><p><span>2 tablespoons</span><span>flour</span></p></label></li>
              </ul>
              <ul>
                <li><label><input type="checkbox"><p><span>4</span><span>egg whites</span></p></label></li>
              </ul>
              <div class="footnote"></div>
            </div>
            "#,
            &mut dispatcher,
        )
        .unwrap();
    drop(dispatcher);
    assert!(run.is_valid(), "{}", run.verdict());
    assert_eq!(
        lines.into_inner(),
        [
            "# Ingredients:",
            "- 1 cup of white sugar",
            "- 2 tablespoons of flour",
            "- 4 of egg whites",
        ]
    );
}

#[test]
fn test_compile_errors_surface_before_matching() {
    assert!(matches!(
        Template::compile("<body>{many}<p></p></body>"),
        Err(TemplateError::UnterminatedOperator { .. }) | Err(TemplateError::Markup(_))
    ));
    assert!(matches!(
        Template::compile("<body>{/[/}</body>"),
        Err(TemplateError::InvalidRegex { .. })
    ));
}

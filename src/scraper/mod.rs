//! Ranking-page extraction: turns rendered markup into `ProductRecord`s.
//!
//! Every list item is handled on its own. An item without a product id is
//! skipped, an item that fails to parse is recorded as an [`ItemFailure`],
//! and neither stops the rest of the batch.

use anyhow::{Context, Result};
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::models::ProductRecord;

const WIDTH_PERCENT: &str = r"width\s*:\s*(\d+)%";

/// CSS selectors describing one ranking list item
#[derive(Debug, Clone)]
pub struct ProductSelectors {
    /// Every product list item on the page
    pub item: String,
    /// Anchor carrying the product id
    pub anchor: String,
    /// Attribute of the anchor holding the product id
    pub id_attribute: String,
    pub brand: String,
    pub name: String,
    pub original_price: String,
    pub sale_price: String,
    /// Element whose inline `width: N%` style encodes the rating
    pub rating: String,
    pub review_count: String,
}

impl Default for ProductSelectors {
    fn default() -> Self {
        Self {
            item: "ul.cate_prd_list li".to_string(),
            anchor: "a.prd_thumb".to_string(),
            id_attribute: "data-ref-goodsno".to_string(),
            brand: "span.tx_brand".to_string(),
            name: "p.tx_name".to_string(),
            original_price: "span.tx_org".to_string(),
            sale_price: "span.tx_cur".to_string(),
            rating: "span.point".to_string(),
            review_count: "span.tx_rev".to_string(),
        }
    }
}

/// Why a single list item could not become a record
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("missing {0}")]
    MissingField(&'static str),
    #[error("{field} is not a number: {raw:?}")]
    InvalidNumber { field: &'static str, raw: String },
    #[error("{field} is out of range: {raw:?}")]
    OutOfRange { field: &'static str, raw: String },
}

/// A list item that was dropped because it failed to parse
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemFailure {
    pub product_id: String,
    pub error: ParseError,
}

/// Result of one extraction pass over a page
#[derive(Debug, Default)]
pub struct Extraction {
    pub products: Vec<ProductRecord>,
    pub failures: Vec<ItemFailure>,
    /// Items without a product id
    pub skipped: usize,
    /// Items matched by the list-item selector
    pub candidates: usize,
}

struct CompiledSelectors {
    item: Selector,
    anchor: Selector,
    brand: Selector,
    name: Selector,
    original_price: Selector,
    sale_price: Selector,
    rating: Selector,
    review_count: Selector,
}

pub struct RankingExtractor {
    selectors: CompiledSelectors,
    id_attribute: String,
    width_percent: Regex,
}

impl RankingExtractor {
    /// Compile the given selectors.
    ///
    /// # Returns
    /// * `Result<Self>` - The extractor, or which selector failed to parse
    pub fn new(selectors: &ProductSelectors) -> Result<Self> {
        Ok(Self {
            selectors: CompiledSelectors {
                item: compile("item", &selectors.item)?,
                anchor: compile("anchor", &selectors.anchor)?,
                brand: compile("brand", &selectors.brand)?,
                name: compile("name", &selectors.name)?,
                original_price: compile("original price", &selectors.original_price)?,
                sale_price: compile("sale price", &selectors.sale_price)?,
                rating: compile("rating", &selectors.rating)?,
                review_count: compile("review count", &selectors.review_count)?,
            },
            id_attribute: selectors.id_attribute.clone(),
            width_percent: Regex::new(WIDTH_PERCENT)
                .context("Failed to compile rating width pattern")?,
        })
    }

    /// Extract every product from the page markup.
    ///
    /// Empty markup and pages without list items both produce an empty
    /// extraction.
    pub fn extract(&self, html: &str) -> Extraction {
        let mut extraction = Extraction::default();
        if html.trim().is_empty() {
            return extraction;
        }

        let document = Html::parse_document(html);
        let items: Vec<ElementRef> = document.select(&self.selectors.item).collect();
        extraction.candidates = items.len();

        let Some(first) = items.first() else {
            warn!("No products found. Check the list item selector.");
            return extraction;
        };
        debug!(html = %first.html(), "First product item");
        info!("Found {} products on the page", items.len());

        for item in items {
            let Some(product_id) = self.product_id(item) else {
                extraction.skipped += 1;
                continue;
            };

            match self.parse_item(item, product_id) {
                Ok(product) => extraction.products.push(product),
                Err(error) => {
                    warn!(product_id, %error, "Error parsing product item");
                    extraction.failures.push(ItemFailure {
                        product_id: product_id.to_string(),
                        error,
                    });
                }
            }
        }

        extraction
    }

    fn product_id<'a>(&self, item: ElementRef<'a>) -> Option<&'a str> {
        item.select(&self.selectors.anchor)
            .next()
            .and_then(|anchor| anchor.value().attr(&self.id_attribute))
            .filter(|id| !id.is_empty())
    }

    fn parse_item(&self, item: ElementRef, product_id: &str) -> Result<ProductRecord, ParseError> {
        let brand_name = first_text(item, &self.selectors.brand)
            .ok_or(ParseError::MissingField("brand name"))?;
        let product_name = first_text(item, &self.selectors.name)
            .ok_or(ParseError::MissingField("product name"))?;

        let original_price = price(item, &self.selectors.original_price, "original price")?;
        let mut sale_price = price(item, &self.selectors.sale_price, "sale price")?;
        // No separate sale price means the item is not discounted.
        if sale_price == 0 && original_price != 0 {
            sale_price = original_price;
        }

        let rating_score = item
            .select(&self.selectors.rating)
            .next()
            .and_then(|el| el.value().attr("style"))
            .and_then(|style| self.rating_from_style(style))
            .unwrap_or(0.0);

        let review_count = match first_text(item, &self.selectors.review_count) {
            Some(text) => parse_integer(&text, "review count")?,
            None => 0,
        };

        Ok(ProductRecord {
            product_id: product_id.to_string(),
            brand_name,
            product_name,
            original_price,
            sale_price,
            rating_score,
            review_count,
        })
    }

    /// Convert an inline style like `width:90%` into a 0-5 score with one decimal.
    ///
    /// Returns `None` when the style carries no percentage width. Widths above
    /// 100% are clamped. The decimal is correctly rounded from the binary
    /// score with ties to even, so 25% gives 1.2 and 91% gives 4.5.
    pub fn rating_from_style(&self, style: &str) -> Option<f64> {
        let captures = self.width_percent.captures(style)?;
        let percentage: f64 = captures[1].parse().ok()?;
        let score = percentage.min(100.0) / 100.0 * 5.0;
        format!("{score:.1}").parse().ok()
    }
}

fn compile(label: &str, css: &str) -> Result<Selector> {
    Selector::parse(css)
        .map_err(|e| anyhow::anyhow!("Failed to parse {label} selector {css:?}: {e:?}"))
}

fn first_text(item: ElementRef, selector: &Selector) -> Option<String> {
    item.select(selector)
        .next()
        .map(|el| el.text().collect::<String>().trim().to_string())
}

fn price(item: ElementRef, selector: &Selector, field: &'static str) -> Result<i32, ParseError> {
    match first_text(item, selector) {
        Some(text) => parse_integer(&text, field),
        None => Ok(0),
    }
}

/// Keep only ASCII digits and decimal points.
pub fn clean_numeric(text: &str) -> String {
    text.chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect()
}

/// Parse display text such as `"10,000원"` into an integer.
///
/// Text without digits reads as 0. Fractions are truncated, so `"9999.9"`
/// becomes 9999.
pub fn parse_integer(text: &str, field: &'static str) -> Result<i32, ParseError> {
    let cleaned = clean_numeric(text);
    if cleaned.is_empty() {
        return Ok(0);
    }

    let value: f64 = cleaned.parse().map_err(|_| ParseError::InvalidNumber {
        field,
        raw: text.to_string(),
    })?;

    let truncated = value.trunc();
    if !truncated.is_finite() || truncated > f64::from(i32::MAX) {
        return Err(ParseError::OutOfRange {
            field,
            raw: text.to_string(),
        });
    }

    #[allow(clippy::cast_possible_truncation)]
    let value = truncated as i32;
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extractor() -> RankingExtractor {
        RankingExtractor::new(&ProductSelectors::default()).unwrap()
    }

    fn page(items: &str) -> String {
        format!(r#"<html><body><ul class="cate_prd_list">{items}</ul></body></html>"#)
    }

    const FULL_ITEM: &str = r#"
        <li>
            <a class="prd_thumb" href="/goods/1" data-ref-goodsno="A000000184228"></a>
            <div class="prd_name">
                <span class="tx_brand"> 라운드랩 </span>
                <p class="tx_name">
                    1025 독도 토너 500ml
                </p>
            </div>
            <p class="prd_price">
                <span class="tx_org"><span class="tx_num">28,000</span>원</span>
                <span class="tx_cur"><span class="tx_num">19,900</span>원</span>
            </p>
            <p class="prd_point_area">
                <span class="review_point"><span class="point" style="width:90%">10점만점에 9점</span></span>
                <span class="tx_rev">(12,345)</span>
            </p>
        </li>"#;

    #[test]
    fn test_selectors_compile() {
        assert!(RankingExtractor::new(&ProductSelectors::default()).is_ok());
    }

    #[test]
    fn invalid_selector_is_reported() {
        let selectors = ProductSelectors {
            brand: "span..tx_brand".to_string(),
            ..ProductSelectors::default()
        };
        let err = RankingExtractor::new(&selectors).err().unwrap();
        assert!(err.to_string().contains("brand selector"));
    }

    #[test]
    fn extracts_a_complete_item() {
        let extraction = extractor().extract(&page(FULL_ITEM));

        assert_eq!(extraction.candidates, 1);
        assert!(extraction.failures.is_empty());
        assert_eq!(
            extraction.products,
            vec![ProductRecord {
                product_id: "A000000184228".to_string(),
                brand_name: "라운드랩".to_string(),
                product_name: "1025 독도 토너 500ml".to_string(),
                original_price: 28000,
                sale_price: 19900,
                rating_score: 4.5,
                review_count: 12345,
            }]
        );
    }

    #[test]
    fn empty_markup_yields_nothing() {
        let extraction = extractor().extract("");
        assert!(extraction.products.is_empty());
        assert_eq!(extraction.candidates, 0);

        let extraction = extractor().extract("   \n");
        assert!(extraction.products.is_empty());
    }

    #[test]
    fn page_without_list_items_yields_nothing() {
        let extraction = extractor().extract("<html><body><p>점검 중</p></body></html>");
        assert!(extraction.products.is_empty());
        assert!(extraction.failures.is_empty());
        assert_eq!(extraction.candidates, 0);
    }

    #[test]
    fn items_without_identifier_are_skipped() {
        let items = format!(
            r#"{FULL_ITEM}
            <li><a class="prd_thumb"></a><span class="tx_brand">B</span><p class="tx_name">N</p></li>
            <li><a class="prd_thumb" data-ref-goodsno=""></a><span class="tx_brand">B</span><p class="tx_name">N</p></li>
            <li><span class="tx_brand">B</span><p class="tx_name">N</p></li>"#
        );
        let extraction = extractor().extract(&page(&items));

        assert_eq!(extraction.candidates, 4);
        assert_eq!(extraction.skipped, 3);
        assert_eq!(extraction.products.len(), 1);
        assert!(extraction.failures.is_empty());
    }

    #[test]
    fn failing_item_does_not_abort_the_batch() {
        let items = format!(
            r#"<li><a class="prd_thumb" data-ref-goodsno="A1"></a><p class="tx_name">No brand</p></li>
            {FULL_ITEM}
            <li><a class="prd_thumb" data-ref-goodsno="A2"></a><span class="tx_brand">B</span>
                <p class="tx_name">N</p><span class="tx_cur">1.2.3원</span></li>"#
        );
        let extraction = extractor().extract(&page(&items));

        assert_eq!(extraction.products.len(), 1);
        assert_eq!(extraction.products[0].product_id, "A000000184228");
        assert_eq!(
            extraction.failures,
            vec![
                ItemFailure {
                    product_id: "A1".to_string(),
                    error: ParseError::MissingField("brand name"),
                },
                ItemFailure {
                    product_id: "A2".to_string(),
                    error: ParseError::InvalidNumber {
                        field: "sale price",
                        raw: "1.2.3원".to_string(),
                    },
                },
            ]
        );
    }

    #[test]
    fn output_preserves_page_order() {
        let items = r#"
            <li><a class="prd_thumb" data-ref-goodsno="B"></a><span class="tx_brand">b</span><p class="tx_name">b</p></li>
            <li><a class="prd_thumb" data-ref-goodsno="A"></a><span class="tx_brand">a</span><p class="tx_name">a</p></li>"#;
        let ids: Vec<String> = extractor()
            .extract(&page(items))
            .products
            .into_iter()
            .map(|p| p.product_id)
            .collect();
        assert_eq!(ids, vec!["B", "A"]);
    }

    #[test]
    fn missing_sale_price_falls_back_to_original() {
        let items = r#"
            <li><a class="prd_thumb" data-ref-goodsno="A1"></a><span class="tx_brand">b</span>
                <p class="tx_name">n</p><span class="tx_org">10,000원</span></li>
            <li><a class="prd_thumb" data-ref-goodsno="A2"></a><span class="tx_brand">b</span>
                <p class="tx_name">n</p><span class="tx_org">10,000원</span><span class="tx_cur">0원</span></li>
            <li><a class="prd_thumb" data-ref-goodsno="A3"></a><span class="tx_brand">b</span>
                <p class="tx_name">n</p><span class="tx_org">10,000원</span><span class="tx_cur">8,000원</span></li>
            <li><a class="prd_thumb" data-ref-goodsno="A4"></a><span class="tx_brand">b</span>
                <p class="tx_name">n</p><span class="tx_cur">8,000원</span></li>"#;
        let products = extractor().extract(&page(items)).products;

        let sale: Vec<(i32, i32)> = products
            .iter()
            .map(|p| (p.original_price, p.sale_price))
            .collect();
        assert_eq!(sale, vec![(10000, 10000), (10000, 10000), (10000, 8000), (0, 8000)]);
    }

    #[test]
    fn optional_fields_default_to_zero() {
        let items = r#"<li><a class="prd_thumb" data-ref-goodsno="A1"></a>
            <span class="tx_brand">b</span><p class="tx_name">n</p><span class="point"></span></li>"#;
        let products = extractor().extract(&page(items)).products;

        assert_eq!(products.len(), 1);
        assert_eq!(products[0].original_price, 0);
        assert_eq!(products[0].sale_price, 0);
        assert_eq!(products[0].rating_score, 0.0);
        assert_eq!(products[0].review_count, 0);
    }

    #[test]
    fn overflowing_price_fails_only_that_item() {
        let items = format!(
            r#"<li><a class="prd_thumb" data-ref-goodsno="A1"></a><span class="tx_brand">b</span>
                <p class="tx_name">n</p><span class="tx_org">99,999,999,999원</span></li>{FULL_ITEM}"#
        );
        let extraction = extractor().extract(&page(&items));

        assert_eq!(extraction.products.len(), 1);
        assert!(matches!(
            extraction.failures[0].error,
            ParseError::OutOfRange { field: "original price", .. }
        ));
    }

    #[test]
    fn numeric_cleaning() {
        assert_eq!(parse_integer("10,000원", "price"), Ok(10000));
        assert_eq!(parse_integer("", "price"), Ok(0));
        assert_eq!(parse_integer("원", "price"), Ok(0));
        assert_eq!(parse_integer("4.5점", "price"), Ok(4));
        assert_eq!(parse_integer("9999.9", "price"), Ok(9999));
        assert_eq!(parse_integer("10000.0", "price"), Ok(10000));
        assert_eq!(parse_integer("(1,234)", "review count"), Ok(1234));
        assert_eq!(clean_numeric(" 리뷰 1.5만+ "), "1.5");
    }

    #[test]
    fn malformed_number_is_an_error() {
        assert_eq!(
            parse_integer("1.2.3", "price"),
            Err(ParseError::InvalidNumber {
                field: "price",
                raw: "1.2.3".to_string()
            })
        );
        assert!(matches!(parse_integer(".", "price"), Err(ParseError::InvalidNumber { .. })));
    }

    #[test]
    fn rating_derivation() {
        let extractor = extractor();
        assert_eq!(extractor.rating_from_style("width:90%"), Some(4.5));
        assert_eq!(extractor.rating_from_style("width: 0%"), Some(0.0));
        assert_eq!(extractor.rating_from_style("display:block; width : 100%;"), Some(5.0));
        assert_eq!(extractor.rating_from_style("width:96%"), Some(4.8));
        assert_eq!(extractor.rating_from_style("width:250%"), Some(5.0));
        assert_eq!(extractor.rating_from_style("color:red"), None);
        assert_eq!(extractor.rating_from_style(""), None);
    }

    #[test]
    fn rating_rounds_like_decimal_rounding_of_the_score() {
        let extractor = extractor();
        let cases = [
            (9, 0.4),
            (19, 0.9),
            (25, 1.2),
            (45, 2.2),
            (69, 3.4),
            (75, 3.8),
            (85, 4.2),
            (91, 4.5),
            (97, 4.8),
        ];
        for (width, expected) in cases {
            let style = format!("width:{width}%");
            assert_eq!(extractor.rating_from_style(&style), Some(expected), "width {width}%");
        }
    }
}

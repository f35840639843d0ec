use std::iter::successors;

use scraper::{ElementRef, Html};

use crate::schema::LevelId;

pub const RATED_A_LEVEL: &str = "Rated a level";

/// Finds the level id of the first "Rated a level" entry of the moderation log.
///
/// The entry is the closest `.form-control` around a `text.dltext` whose text contains
/// [`RATED_A_LEVEL`], and the id is the run of digits between an icon (`</i>`) and the
/// closing `</div>` in its markup.
pub fn extract_rated_level_id(html: &Html) -> Option<LevelId> {
    let container = html
        .select(selector!("text.dltext"))
        .filter(|text| text.text().collect::<String>().contains(RATED_A_LEVEL))
        .find_map(closest_form_control)?;
    let markup = container.inner_html();
    let captures = regex!(r"</i>\s*([0-9]+)</div>").captures(&markup)?;
    captures[1].parse().ok()
}

fn closest_form_control(element: ElementRef) -> Option<ElementRef> {
    successors(Some(element), |e| e.parent().and_then(ElementRef::wrap))
        .find(|e| selector!(".form-control").matches(e))
}

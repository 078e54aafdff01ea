use crate::domain::query::{MarketQuery, REGION};

fn output_schema() -> String {
    [
        "{",
        "  \"currentPrice\": number,            // today's mandi price per unit, in INR, > 0",
        "  \"predictedPrice\": number,          // expected price per unit within 7 days, in INR, > 0",
        "  \"recommendation\": \"SELL_NOW\" | \"WAIT\",",
        "  \"risk\": \"LOW\" | \"MEDIUM\" | \"HIGH\",",
        "  \"explanation\": string,             // professional analysis in English",
        "  \"explanationTelugu\": string,       // the same advice in simple Telugu",
        "  \"profitDelta\": number,             // extra INR earned by waiting, for the whole quantity",
        "  \"daysToWait\": integer,             // >= 0, 0 when SELL_NOW",
        "  \"qualityGrade\": \"A\" | \"B\" | \"C\" | null,",
        "  \"qualityAssessment\": string | null,",
        "  \"trendData\": [{\"day\": \"Mon\", \"price\": number}, ...]   // 7 entries",
        "}",
    ]
    .join("\n")
}

/// Builds the analysis prompt. The output depends only on the query fields.
pub fn build_prompt(query: &MarketQuery) -> String {
    let quality = if query.image().is_some() {
        "4. QUALITY: A photo of the crop is attached. Grade its visual quality \
         (A=Excellent, B=Good, C=Average) in qualityGrade and summarise what you see in qualityAssessment."
    } else {
        "4. QUALITY: No photo is attached. Set qualityGrade and qualityAssessment to null."
    };

    format!(
        "Act as a professional Indian Agricultural Market Analyst specializing in the {REGION}/Hyderabad region.\n\
\n\
CROP: {crop}\n\
QUANTITY: {quantity} {unit}\n\
LOCATION: {location}, {REGION}\n\
\n\
INSTRUCTIONS:\n\
1. LIVE SEARCH: Use Google Search to find ACTUAL TODAY'S prices for {crop} in {location} and nearby {REGION} mandis. Do not rely on memory.\n\
2. PREDICTION: Forecast the price for the next 7 days.\n\
- Suggest WAIT if a price increase > 10% is expected.\n\
- Suggest SELL_NOW if prices are peaking or likely to drop.\n\
3. PROFIT: Compute profitDelta for {quantity} {unit} of {crop}.\n\
{quality}\n\
\n\
OUTPUT SCHEMA:\n\
{schema}\n\
\n\
Return ONLY this JSON object. No markdown, no prose, no comments, no extra keys.",
        crop = query.crop(),
        quantity = query.quantity(),
        unit = query.unit(),
        location = query.location(),
        schema = output_schema(),
    )
}

//! Technical analysis tools over historical bars.
//!
//! Indicators are computed in-process from the broker's bar data, so the
//! chat model gets one compact result object per indicator instead of raw
//! price series.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use optra_broker::client::Brokerage;
use optra_broker::types::Bar;

use crate::error::AgentError;
use crate::registry::{function_schema, Tool};
use crate::tools::{f64_arg, str_arg, usize_arg, ToolContext};

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

fn closes(bars: &[Bar]) -> Vec<f64> {
    bars.iter().map(|b| b.close).collect()
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample standard deviation (n - 1 denominator).
fn stddev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    var.sqrt()
}

/// Recursive exponential moving average, seeded with the first value.
fn ema(values: &[f64], span: usize) -> Vec<f64> {
    let alpha = 2.0 / (span as f64 + 1.0);
    let mut out = Vec::with_capacity(values.len());
    let mut prev = match values.first() {
        Some(v) => *v,
        None => return out,
    };
    out.push(prev);
    for v in &values[1..] {
        prev = alpha * v + (1.0 - alpha) * prev;
        out.push(prev);
    }
    out
}

/// Abramowitz and Stegun erf approximation, max error ~1.5e-7.
fn erf(x: f64) -> f64 {
    let sign = if x < 0.0 { -1.0 } else { 1.0 };
    let x = x.abs();
    let t = 1.0 / (1.0 + 0.3275911 * x);
    let poly = t
        * (0.254829592
            + t * (-0.284496736 + t * (1.421413741 + t * (-1.453152027 + t * 1.061405429))));
    sign * (1.0 - poly * (-x * x).exp())
}

fn norm_cdf(x: f64) -> f64 {
    0.5 * (1.0 + erf(x / std::f64::consts::SQRT_2))
}

fn norm_pdf(x: f64) -> f64 {
    (-0.5 * x * x).exp() / (2.0 * std::f64::consts::PI).sqrt()
}

#[derive(Debug, PartialEq)]
pub(crate) struct BsGreeks {
    pub delta: f64,
    pub gamma: f64,
    pub theta: f64,
    pub vega: f64,
    pub rho: f64,
}

/// Closed-form Black-Scholes greeks. Theta is per calendar day, vega and
/// rho per 1% move in volatility and rates.
pub(crate) fn black_scholes_greeks(
    spot: f64,
    strike: f64,
    years: f64,
    vol: f64,
    rate: f64,
    is_call: bool,
) -> Option<BsGreeks> {
    if spot <= 0.0 || strike <= 0.0 || years <= 0.0 || vol <= 0.0 {
        return None;
    }
    let sqrt_t = years.sqrt();
    let d1 = ((spot / strike).ln() + (rate + 0.5 * vol * vol) * years) / (vol * sqrt_t);
    let d2 = d1 - vol * sqrt_t;
    let discount = (-rate * years).exp();

    let delta = if is_call {
        norm_cdf(d1)
    } else {
        norm_cdf(d1) - 1.0
    };
    let gamma = norm_pdf(d1) / (spot * vol * sqrt_t);
    let vega = spot * norm_pdf(d1) * sqrt_t / 100.0;
    let decay = -spot * norm_pdf(d1) * vol / (2.0 * sqrt_t);
    let theta = if is_call {
        (decay - rate * strike * discount * norm_cdf(d2)) / 365.0
    } else {
        (decay + rate * strike * discount * norm_cdf(-d2)) / 365.0
    };
    let rho = if is_call {
        strike * years * discount * norm_cdf(d2) / 100.0
    } else {
        -strike * years * discount * norm_cdf(-d2) / 100.0
    };

    Some(BsGreeks {
        delta,
        gamma,
        theta,
        vega,
        rho,
    })
}

#[derive(Debug, PartialEq)]
pub(crate) struct OccContract {
    pub underlying: String,
    pub expiration: chrono::NaiveDate,
    pub is_call: bool,
    pub strike: f64,
}

/// Parse an OCC option symbol, e.g. `SPY260918C00450000`.
pub(crate) fn parse_occ_symbol(symbol: &str) -> Option<OccContract> {
    // Underlying is 1-6 leading letters; the tail is fixed-width:
    // YYMMDD, C or P, strike in thousandths padded to 8 digits.
    if symbol.len() < 16 {
        return None;
    }
    let split = symbol.len() - 15;
    let (underlying, tail) = symbol.split_at(split);
    if underlying.is_empty() || !underlying.chars().all(|c| c.is_ascii_alphabetic()) {
        return None;
    }
    let (date_part, rest) = tail.split_at(6);
    let expiration = chrono::NaiveDate::parse_from_str(date_part, "%y%m%d").ok()?;
    let is_call = match rest.as_bytes()[0] {
        b'C' => true,
        b'P' => false,
        _ => return None,
    };
    let strike: f64 = rest[1..].parse::<u64>().ok()? as f64 / 1000.0;
    Some(OccContract {
        underlying: underlying.to_string(),
        expiration,
        is_call,
        strike,
    })
}

fn timeframe_arg(args: &Map<String, Value>) -> String {
    str_arg(args, "timeframe").unwrap_or("1Hour").to_string()
}

fn symbol_arg(args: &Map<String, Value>, tool: &str) -> Result<String, AgentError> {
    str_arg(args, "symbol")
        .map(|s| s.to_string())
        .ok_or_else(|| AgentError::Validation(format!("{tool} requires a string 'symbol' argument")))
}

fn insufficient(symbol: &str, indicator: &str) -> AgentError {
    AgentError::Validation(format!("Insufficient price data for {symbol} ({indicator})"))
}

pub struct CalculateRsi {
    brokerage: Arc<dyn Brokerage>,
}

impl CalculateRsi {
    pub fn new(ctx: &ToolContext) -> Self {
        Self {
            brokerage: ctx.brokerage.clone(),
        }
    }
}

#[async_trait]
impl Tool for CalculateRsi {
    fn name(&self) -> &'static str {
        "calculate_rsi"
    }

    fn schema(&self) -> Value {
        function_schema(
            self.name(),
            "RSI indicator for an underlying. Above 70 is overbought, below 30 oversold.",
            json!({
                "type": "object",
                "properties": {
                    "symbol": {"type": "string"},
                    "period": {"type": "integer", "description": "RSI period (default 14)"},
                    "timeframe": {"type": "string", "enum": ["1Min", "5Min", "15Min", "1Hour", "1Day"]}
                },
                "required": ["symbol"]
            }),
        )
    }

    async fn call(&self, args: &Map<String, Value>) -> Result<Value, AgentError> {
        let symbol = symbol_arg(args, self.name())?;
        let period = usize_arg(args, "period", 14);
        let timeframe = timeframe_arg(args);

        let bars = self.brokerage.bars(&symbol, &timeframe, period * 3).await?;
        let closes = closes(&bars);
        if closes.len() < period + 1 {
            return Err(insufficient(&symbol, "RSI"));
        }

        // Rolling mean of gains and losses over the last window.
        let deltas: Vec<f64> = closes.windows(2).map(|w| w[1] - w[0]).collect();
        let window = &deltas[deltas.len() - period..];
        let gain = window.iter().filter(|d| **d > 0.0).sum::<f64>() / period as f64;
        let loss = window.iter().filter(|d| **d < 0.0).map(|d| -d).sum::<f64>() / period as f64;

        let rsi = if loss == 0.0 {
            100.0
        } else {
            100.0 - 100.0 / (1.0 + gain / loss)
        };

        let signal = if rsi > 70.0 {
            "overbought"
        } else if rsi < 30.0 {
            "oversold"
        } else {
            "neutral"
        };
        let hint = match signal {
            "overbought" => "Consider selling",
            "oversold" => "Consider buying",
            _ => "No strong signal",
        };

        Ok(json!({
            "symbol": symbol,
            "indicator": "RSI",
            "period": period,
            "timeframe": timeframe,
            "current_value": round2(rsi),
            "signal": signal,
            "interpretation": format!("RSI is {signal}. {hint}"),
        }))
    }
}

pub struct CalculateMacd {
    brokerage: Arc<dyn Brokerage>,
}

impl CalculateMacd {
    pub fn new(ctx: &ToolContext) -> Self {
        Self {
            brokerage: ctx.brokerage.clone(),
        }
    }
}

#[async_trait]
impl Tool for CalculateMacd {
    fn name(&self) -> &'static str {
        "calculate_macd"
    }

    fn schema(&self) -> Value {
        function_schema(
            self.name(),
            "MACD (12/26/9) with crossover detection.",
            json!({
                "type": "object",
                "properties": {
                    "symbol": {"type": "string"},
                    "timeframe": {"type": "string", "enum": ["1Min", "5Min", "15Min", "1Hour", "1Day"]}
                },
                "required": ["symbol"]
            }),
        )
    }

    async fn call(&self, args: &Map<String, Value>) -> Result<Value, AgentError> {
        let symbol = symbol_arg(args, self.name())?;
        let timeframe = timeframe_arg(args);

        let bars = self.brokerage.bars(&symbol, &timeframe, 100).await?;
        let closes = closes(&bars);
        if closes.len() < 27 {
            return Err(insufficient(&symbol, "MACD"));
        }

        let fast = ema(&closes, 12);
        let slow = ema(&closes, 26);
        let macd_line: Vec<f64> = fast.iter().zip(&slow).map(|(f, s)| f - s).collect();
        let signal_line = ema(&macd_line, 9);
        let histogram: Vec<f64> = macd_line
            .iter()
            .zip(&signal_line)
            .map(|(m, s)| m - s)
            .collect();

        let current = histogram[histogram.len() - 1];
        let prev = histogram[histogram.len() - 2];

        let signal = if current > 0.0 && prev <= 0.0 {
            "bullish_crossover"
        } else if current < 0.0 && prev >= 0.0 {
            "bearish_crossover"
        } else if current > 0.0 {
            "bullish"
        } else {
            "bearish"
        };
        let hint = if signal.contains("bullish") {
            "Consider buying"
        } else {
            "Consider selling"
        };

        Ok(json!({
            "symbol": symbol,
            "indicator": "MACD",
            "timeframe": timeframe,
            "macd_line": round2(macd_line[macd_line.len() - 1]),
            "signal_line": round2(signal_line[signal_line.len() - 1]),
            "histogram": round2(current),
            "signal": signal,
            "interpretation": format!("MACD is {signal}. {hint}"),
        }))
    }
}

pub struct CalculateMovingAverages {
    brokerage: Arc<dyn Brokerage>,
}

impl CalculateMovingAverages {
    pub fn new(ctx: &ToolContext) -> Self {
        Self {
            brokerage: ctx.brokerage.clone(),
        }
    }
}

#[async_trait]
impl Tool for CalculateMovingAverages {
    fn name(&self) -> &'static str {
        "calculate_moving_averages"
    }

    fn schema(&self) -> Value {
        function_schema(
            self.name(),
            "Simple moving averages (default 20/50/200) with a trend verdict.",
            json!({
                "type": "object",
                "properties": {
                    "symbol": {"type": "string"},
                    "periods": {"type": "array", "items": {"type": "integer"}},
                    "timeframe": {"type": "string", "enum": ["1Min", "5Min", "15Min", "1Hour", "1Day"]}
                },
                "required": ["symbol"]
            }),
        )
    }

    async fn call(&self, args: &Map<String, Value>) -> Result<Value, AgentError> {
        let symbol = symbol_arg(args, self.name())?;
        let timeframe = timeframe_arg(args);
        let periods: Vec<usize> = args
            .get("periods")
            .and_then(Value::as_array)
            .map(|a| {
                a.iter()
                    .filter_map(Value::as_u64)
                    .filter(|p| *p > 0)
                    .map(|p| p as usize)
                    .collect()
            })
            .filter(|v: &Vec<usize>| !v.is_empty())
            .unwrap_or_else(|| vec![20, 50, 200]);

        let max_period = periods.iter().copied().max().unwrap_or(20);
        let limit = max_period * 3 / 2;
        let bars = self.brokerage.bars(&symbol, &timeframe, limit).await?;
        let closes = closes(&bars);
        let Some(current_price) = closes.last().copied() else {
            return Err(insufficient(&symbol, "Moving_Averages"));
        };

        let mut moving_averages = Map::new();
        for period in &periods {
            if closes.len() >= *period {
                let ma = mean(&closes[closes.len() - period..]);
                moving_averages.insert(format!("MA_{period}"), json!(round2(ma)));
            }
        }
        if moving_averages.is_empty() {
            return Err(insufficient(&symbol, "Moving_Averages"));
        }

        let values: Vec<f64> = moving_averages
            .values()
            .filter_map(Value::as_f64)
            .collect();
        let trend = if values.iter().all(|ma| current_price > *ma) {
            "strong_bullish"
        } else if values.iter().all(|ma| current_price < *ma) {
            "strong_bearish"
        } else {
            "mixed"
        };

        Ok(json!({
            "symbol": symbol,
            "indicator": "Moving_Averages",
            "timeframe": timeframe,
            "current_price": round2(current_price),
            "moving_averages": moving_averages,
            "trend": trend,
            "interpretation": format!("Price is {trend} relative to moving averages"),
        }))
    }
}

pub struct CalculateBollingerBands {
    brokerage: Arc<dyn Brokerage>,
}

impl CalculateBollingerBands {
    pub fn new(ctx: &ToolContext) -> Self {
        Self {
            brokerage: ctx.brokerage.clone(),
        }
    }
}

#[async_trait]
impl Tool for CalculateBollingerBands {
    fn name(&self) -> &'static str {
        "calculate_bollinger_bands"
    }

    fn schema(&self) -> Value {
        function_schema(
            self.name(),
            "Bollinger Bands for volatility and band-position signals.",
            json!({
                "type": "object",
                "properties": {
                    "symbol": {"type": "string"},
                    "period": {"type": "integer", "description": "Band period (default 20)"},
                    "std_dev": {"type": "number", "description": "Standard deviations (default 2)"},
                    "timeframe": {"type": "string", "enum": ["1Min", "5Min", "15Min", "1Hour", "1Day"]}
                },
                "required": ["symbol"]
            }),
        )
    }

    async fn call(&self, args: &Map<String, Value>) -> Result<Value, AgentError> {
        let symbol = symbol_arg(args, self.name())?;
        let period = usize_arg(args, "period", 20);
        let std_dev = f64_arg(args, "std_dev").unwrap_or(2.0);
        let timeframe = timeframe_arg(args);

        let bars = self.brokerage.bars(&symbol, &timeframe, period * 2).await?;
        let closes = closes(&bars);
        if closes.len() < period {
            return Err(insufficient(&symbol, "Bollinger_Bands"));
        }
        let current_price = closes[closes.len() - 1];

        let window = &closes[closes.len() - period..];
        let middle = mean(window);
        let spread = stddev(window) * std_dev;
        let upper = middle + spread;
        let lower = middle - spread;
        let bandwidth = if middle != 0.0 {
            (upper - lower) / middle * 100.0
        } else {
            0.0
        };

        let (signal, interpretation) = if current_price >= upper {
            ("at_upper_band", "Price at upper band, overbought, consider selling")
        } else if current_price <= lower {
            ("at_lower_band", "Price at lower band, oversold, consider buying")
        } else if current_price > middle {
            ("above_middle", "Price above middle band, bullish")
        } else {
            ("below_middle", "Price below middle band, bearish")
        };

        Ok(json!({
            "symbol": symbol,
            "indicator": "Bollinger_Bands",
            "timeframe": timeframe,
            "current_price": round2(current_price),
            "upper_band": round2(upper),
            "middle_band": round2(middle),
            "lower_band": round2(lower),
            "bandwidth_percent": round2(bandwidth),
            "signal": signal,
            "interpretation": interpretation,
        }))
    }
}

pub struct GetPriceMomentum {
    brokerage: Arc<dyn Brokerage>,
}

impl GetPriceMomentum {
    pub fn new(ctx: &ToolContext) -> Self {
        Self {
            brokerage: ctx.brokerage.clone(),
        }
    }
}

#[async_trait]
impl Tool for GetPriceMomentum {
    fn name(&self) -> &'static str {
        "get_price_momentum"
    }

    fn schema(&self) -> Value {
        function_schema(
            self.name(),
            "Rate of change over a lookback window, with direction and strength.",
            json!({
                "type": "object",
                "properties": {
                    "symbol": {"type": "string"},
                    "periods": {"type": "integer", "description": "Lookback bars (default 20)"},
                    "timeframe": {"type": "string", "enum": ["1Min", "5Min", "15Min", "1Hour", "1Day"]}
                },
                "required": ["symbol"]
            }),
        )
    }

    async fn call(&self, args: &Map<String, Value>) -> Result<Value, AgentError> {
        let symbol = symbol_arg(args, self.name())?;
        let periods = usize_arg(args, "periods", 20);
        let timeframe = timeframe_arg(args);

        let bars = self.brokerage.bars(&symbol, &timeframe, periods + 10).await?;
        let closes = closes(&bars);
        if closes.len() < periods {
            return Err(insufficient(&symbol, "Price_Momentum"));
        }

        let current_price = closes[closes.len() - 1];
        let past_price = closes[closes.len() - periods];
        if past_price == 0.0 {
            return Err(insufficient(&symbol, "Price_Momentum"));
        }
        let momentum = (current_price - past_price) / past_price * 100.0;

        let strength = if momentum.abs() > 10.0 {
            "strong"
        } else if momentum.abs() > 5.0 {
            "moderate"
        } else {
            "weak"
        };
        let direction = if momentum > 0.0 { "bullish" } else { "bearish" };

        Ok(json!({
            "symbol": symbol,
            "indicator": "Price_Momentum",
            "timeframe": timeframe,
            "periods": periods,
            "current_price": round2(current_price),
            "past_price": round2(past_price),
            "momentum_percent": round2(momentum),
            "direction": direction,
            "strength": strength,
            "interpretation": format!("{strength} {direction} momentum over {periods} periods"),
        }))
    }
}

pub struct GetSupportResistance {
    brokerage: Arc<dyn Brokerage>,
}

impl GetSupportResistance {
    pub fn new(ctx: &ToolContext) -> Self {
        Self {
            brokerage: ctx.brokerage.clone(),
        }
    }
}

#[async_trait]
impl Tool for GetSupportResistance {
    fn name(&self) -> &'static str {
        "get_support_resistance"
    }

    fn schema(&self) -> Value {
        function_schema(
            self.name(),
            "Support and resistance levels from recent highs and lows.",
            json!({
                "type": "object",
                "properties": {
                    "symbol": {"type": "string"},
                    "lookback": {"type": "integer", "description": "Bars to analyze (default 50)"},
                    "timeframe": {"type": "string", "enum": ["1Min", "5Min", "15Min", "1Hour", "1Day"]}
                },
                "required": ["symbol"]
            }),
        )
    }

    async fn call(&self, args: &Map<String, Value>) -> Result<Value, AgentError> {
        let symbol = symbol_arg(args, self.name())?;
        let lookback = usize_arg(args, "lookback", 50);
        let timeframe = str_arg(args, "timeframe").unwrap_or("1Day").to_string();

        let bars = self.brokerage.bars(&symbol, &timeframe, lookback).await?;
        if bars.is_empty() {
            return Err(insufficient(&symbol, "Support_Resistance"));
        }

        let current_price = bars[bars.len() - 1].close;
        let resistance = bars.iter().map(|b| b.high).fold(f64::MIN, f64::max);
        let support = bars.iter().map(|b| b.low).fold(f64::MAX, f64::min);
        if current_price == 0.0 {
            return Err(insufficient(&symbol, "Support_Resistance"));
        }

        let to_resistance = (resistance - current_price) / current_price * 100.0;
        let to_support = (current_price - support) / current_price * 100.0;

        Ok(json!({
            "symbol": symbol,
            "indicator": "Support_Resistance",
            "timeframe": timeframe,
            "current_price": round2(current_price),
            "resistance_level": round2(resistance),
            "support_level": round2(support),
            "distance_to_resistance_pct": round2(to_resistance),
            "distance_to_support_pct": round2(to_support),
            "interpretation": format!(
                "Price {:.1}% above support, {:.1}% below resistance",
                to_support, to_resistance
            ),
        }))
    }
}

pub struct AnalyzeMultiTimeframes {
    brokerage: Arc<dyn Brokerage>,
}

impl AnalyzeMultiTimeframes {
    pub fn new(ctx: &ToolContext) -> Self {
        Self {
            brokerage: ctx.brokerage.clone(),
        }
    }
}

#[async_trait]
impl Tool for AnalyzeMultiTimeframes {
    fn name(&self) -> &'static str {
        "analyze_multi_timeframes"
    }

    fn schema(&self) -> Value {
        function_schema(
            self.name(),
            "Trend and volatility across several timeframes with an aggregate verdict.",
            json!({
                "type": "object",
                "properties": {
                    "symbol": {"type": "string"},
                    "timeframes": {"type": "array", "items": {"type": "string"}},
                    "lookback": {"type": "integer", "description": "Bars per timeframe (default 60)"}
                },
                "required": ["symbol"]
            }),
        )
    }

    async fn call(&self, args: &Map<String, Value>) -> Result<Value, AgentError> {
        let symbol = symbol_arg(args, self.name())?;
        let lookback = usize_arg(args, "lookback", 60);
        let timeframes: Vec<String> = args
            .get("timeframes")
            .and_then(Value::as_array)
            .map(|a| {
                a.iter()
                    .filter_map(Value::as_str)
                    .map(String::from)
                    .collect()
            })
            .filter(|v: &Vec<String>| !v.is_empty())
            .unwrap_or_else(|| {
                vec!["15Min".to_string(), "1Hour".to_string(), "1Day".to_string()]
            });

        let mut analysis = Vec::new();
        let mut bullish = 0usize;
        let mut bearish = 0usize;
        let mut neutral = 0usize;

        for timeframe in &timeframes {
            let bars = match self.brokerage.bars(&symbol, timeframe, lookback).await {
                Ok(bars) => bars,
                Err(e) => {
                    analysis.push(json!({"timeframe": timeframe, "error": e.to_string()}));
                    continue;
                }
            };
            let closes = closes(&bars);
            if closes.len() < 5 {
                analysis.push(json!({"timeframe": timeframe, "error": "Insufficient data"}));
                continue;
            }

            let current_price = closes[closes.len() - 1];
            let start_price = closes[0];
            let change_pct = if start_price != 0.0 {
                (current_price - start_price) / start_price * 100.0
            } else {
                0.0
            };

            let short_window = closes.len().min(10);
            let long_window = closes.len().min(short_window.max(20));
            let short_ma = mean(&closes[closes.len() - short_window..]);
            let long_ma = mean(&closes[closes.len() - long_window..]);

            let trend = if short_ma > long_ma * 1.001 {
                bullish += 1;
                "bullish"
            } else if short_ma < long_ma * 0.999 {
                bearish += 1;
                "bearish"
            } else {
                neutral += 1;
                "neutral"
            };

            let recent = &closes[closes.len() - short_window..];
            let hi = recent.iter().copied().fold(f64::MIN, f64::max);
            let lo = recent.iter().copied().fold(f64::MAX, f64::min);
            let volatility = if current_price != 0.0 {
                (hi - lo) / current_price * 100.0
            } else {
                0.0
            };

            analysis.push(json!({
                "timeframe": timeframe,
                "current_price": round2(current_price),
                "change_percent": round2(change_pct),
                "short_ma": round2(short_ma),
                "long_ma": round2(long_ma),
                "trend": trend,
                "volatility_percent": round2(volatility),
            }));
        }

        let total = (bullish + bearish + neutral).max(1);
        let dominant = if bullish >= bearish && bullish >= neutral {
            "bullish"
        } else if bearish >= neutral {
            "bearish"
        } else {
            "neutral"
        };

        Ok(json!({
            "symbol": symbol,
            "timeframes": timeframes,
            "analysis": analysis,
            "summary": {
                "trend_counts": {"bullish": bullish, "bearish": bearish, "neutral": neutral},
                "dominant_trend": dominant,
                "bullish_ratio": round2(bullish as f64 / total as f64),
                "bearish_ratio": round2(bearish as f64 / total as f64),
            }
        }))
    }
}

pub struct AnalyzeOptionGreeks {
    brokerage: Arc<dyn Brokerage>,
}

impl AnalyzeOptionGreeks {
    pub fn new(ctx: &ToolContext) -> Self {
        Self {
            brokerage: ctx.brokerage.clone(),
        }
    }
}

#[async_trait]
impl Tool for AnalyzeOptionGreeks {
    fn name(&self) -> &'static str {
        "analyze_option_greeks"
    }

    fn schema(&self) -> Value {
        function_schema(
            self.name(),
            "Greeks for an option contract: from the quote feed when available, \
             otherwise computed from Black-Scholes.",
            json!({
                "type": "object",
                "properties": {
                    "symbol": {"type": "string", "description": "OCC option symbol"},
                    "implied_volatility": {"type": "number", "description": "Fallback IV when the feed has none (default 0.25)"},
                    "risk_free_rate": {"type": "number", "description": "Annual rate (default 0.04)"}
                },
                "required": ["symbol"]
            }),
        )
    }

    async fn call(&self, args: &Map<String, Value>) -> Result<Value, AgentError> {
        let symbol = symbol_arg(args, self.name())?;
        let contract = parse_occ_symbol(&symbol).ok_or_else(|| {
            AgentError::Validation(format!("{symbol} is not a valid OCC option symbol"))
        })?;

        let quote = self.brokerage.latest_option_quote(&symbol).await?;
        let feed_greeks = quote.greeks.clone().unwrap_or_default();

        if let Some(delta) = feed_greeks.delta {
            return Ok(greeks_result(
                &symbol,
                &contract,
                "quote_feed",
                delta,
                feed_greeks.gamma.unwrap_or(0.0),
                feed_greeks.theta.unwrap_or(0.0),
                feed_greeks.vega.unwrap_or(0.0),
                feed_greeks.rho.unwrap_or(0.0),
                feed_greeks.implied_volatility,
            ));
        }

        let spot_quote = self
            .brokerage
            .latest_equity_quote(&contract.underlying)
            .await?;
        let spot = spot_quote.reference_price().ok_or_else(|| {
            AgentError::Validation(format!("missing price data for {}", contract.underlying))
        })?;

        let vol = feed_greeks
            .implied_volatility
            .or_else(|| f64_arg(args, "implied_volatility"))
            .unwrap_or(0.25);
        let rate = f64_arg(args, "risk_free_rate").unwrap_or(0.04);
        let days = (contract.expiration - chrono::Utc::now().date_naive()).num_days();
        let years = (days.max(1) as f64) / 365.0;

        let greeks = black_scholes_greeks(spot, contract.strike, years, vol, rate, contract.is_call)
            .ok_or_else(|| {
                AgentError::Validation(format!("cannot price {symbol} with the available inputs"))
            })?;

        Ok(greeks_result(
            &symbol,
            &contract,
            "black_scholes",
            greeks.delta,
            greeks.gamma,
            greeks.theta,
            greeks.vega,
            greeks.rho,
            Some(vol),
        ))
    }
}

#[allow(clippy::too_many_arguments)]
fn greeks_result(
    symbol: &str,
    contract: &OccContract,
    source: &str,
    delta: f64,
    gamma: f64,
    theta: f64,
    vega: f64,
    rho: f64,
    implied_volatility: Option<f64>,
) -> Value {
    let exposure = if delta.abs() > 0.7 {
        "deep in the money, moves nearly 1:1 with the underlying"
    } else if delta.abs() > 0.4 {
        "near the money, high sensitivity to the underlying"
    } else {
        "out of the money, mostly time value"
    };
    json!({
        "symbol": symbol,
        "underlying_symbol": contract.underlying,
        "option_type": if contract.is_call { "call" } else { "put" },
        "strike_price": contract.strike,
        "expiration_date": contract.expiration.format("%Y-%m-%d").to_string(),
        "source": source,
        "delta": round4(delta),
        "gamma": round4(gamma),
        "theta": round4(theta),
        "vega": round4(vega),
        "rho": round4(rho),
        "implied_volatility": implied_volatility,
        "interpretation": format!("Delta {:.2}: {exposure}. Theta {:.4} per day.", delta, theta),
    })
}

fn round4(v: f64) -> f64 {
    (v * 10_000.0).round() / 10_000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use optra_broker::test_support::{sample_bars, MockBrokerage};
    use optra_ledger::DecisionLedger;

    fn ctx(mock: Arc<MockBrokerage>) -> ToolContext {
        ToolContext {
            brokerage: mock,
            search: None,
            ledger: Arc::new(DecisionLedger::new("/tmp/unused-ledger.json")),
        }
    }

    fn args(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn ema_matches_recursive_definition() {
        let series = [1.0, 2.0, 3.0, 4.0];
        let out = ema(&series, 3);
        // alpha = 0.5: 1.0, 1.5, 2.25, 3.125
        assert_eq!(out, vec![1.0, 1.5, 2.25, 3.125]);
    }

    #[test]
    fn stddev_is_sample_std() {
        let v = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert!((stddev(&v) - 2.138089935).abs() < 1e-6);
    }

    #[test]
    fn norm_cdf_known_values() {
        assert!((norm_cdf(0.0) - 0.5).abs() < 1e-7);
        assert!((norm_cdf(1.96) - 0.975).abs() < 1e-3);
        assert!((norm_cdf(-1.96) - 0.025).abs() < 1e-3);
    }

    #[test]
    fn black_scholes_atm_call_delta_near_half() {
        let g = black_scholes_greeks(100.0, 100.0, 0.25, 0.2, 0.04, true).unwrap();
        assert!(g.delta > 0.5 && g.delta < 0.6, "delta = {}", g.delta);
        assert!(g.gamma > 0.0);
        assert!(g.theta < 0.0);
        assert!(g.vega > 0.0);

        let p = black_scholes_greeks(100.0, 100.0, 0.25, 0.2, 0.04, false).unwrap();
        assert!((g.delta - p.delta - 1.0).abs() < 1e-9); // put-call parity on delta
    }

    #[test]
    fn black_scholes_rejects_degenerate_inputs() {
        assert!(black_scholes_greeks(0.0, 100.0, 0.25, 0.2, 0.04, true).is_none());
        assert!(black_scholes_greeks(100.0, 100.0, 0.0, 0.2, 0.04, true).is_none());
    }

    #[test]
    fn occ_symbol_parses() {
        let c = parse_occ_symbol("SPY260918C00450000").unwrap();
        assert_eq!(c.underlying, "SPY");
        assert_eq!(c.strike, 450.0);
        assert!(c.is_call);
        assert_eq!(c.expiration.format("%Y-%m-%d").to_string(), "2026-09-18");

        let p = parse_occ_symbol("QQQ261120P00380500").unwrap();
        assert!(!p.is_call);
        assert_eq!(p.strike, 380.5);

        assert!(parse_occ_symbol("SPY").is_none());
        assert!(parse_occ_symbol("SPY260918X00450000").is_none());
    }

    #[tokio::test]
    async fn rsi_is_100_on_monotonic_rise() {
        let mock = Arc::new(MockBrokerage::default());
        *mock.bars.lock().unwrap() = sample_bars(100.0, 1.0, 45);
        let tool = CalculateRsi::new(&ctx(mock));
        let result = tool.call(&args(json!({"symbol": "SPY"}))).await.unwrap();
        assert_eq!(result["current_value"], json!(100.0));
        assert_eq!(result["signal"], json!("overbought"));
    }

    #[tokio::test]
    async fn macd_positive_on_uptrend() {
        let mock = Arc::new(MockBrokerage::default());
        *mock.bars.lock().unwrap() = sample_bars(100.0, 0.5, 100);
        let tool = CalculateMacd::new(&ctx(mock));
        let result = tool.call(&args(json!({"symbol": "SPY"}))).await.unwrap();
        assert!(result["macd_line"].as_f64().unwrap() > 0.0);
        assert!(result["signal"].as_str().unwrap().contains("bullish"));
    }

    #[tokio::test]
    async fn moving_averages_trend_bullish_on_rise() {
        let mock = Arc::new(MockBrokerage::default());
        *mock.bars.lock().unwrap() = sample_bars(100.0, 1.0, 300);
        let tool = CalculateMovingAverages::new(&ctx(mock));
        let result = tool.call(&args(json!({"symbol": "SPY"}))).await.unwrap();
        assert_eq!(result["trend"], json!("strong_bullish"));
        assert!(result["moving_averages"]["MA_20"].is_number());
        assert!(result["moving_averages"]["MA_200"].is_number());
    }

    #[tokio::test]
    async fn momentum_reports_percent_change() {
        let mock = Arc::new(MockBrokerage::default());
        *mock.bars.lock().unwrap() = sample_bars(100.0, 1.0, 30);
        let tool = GetPriceMomentum::new(&ctx(mock));
        let result = tool
            .call(&args(json!({"symbol": "SPY", "periods": 20})))
            .await
            .unwrap();
        // closes run 100..129; past = closes[10] = 110, current = 129.
        assert_eq!(result["past_price"], json!(110.0));
        assert_eq!(result["current_price"], json!(129.0));
        assert_eq!(result["direction"], json!("bullish"));
    }

    #[tokio::test]
    async fn support_resistance_uses_extremes() {
        let mock = Arc::new(MockBrokerage::default());
        *mock.bars.lock().unwrap() = sample_bars(100.0, 1.0, 50);
        let tool = GetSupportResistance::new(&ctx(mock));
        let result = tool.call(&args(json!({"symbol": "SPY"}))).await.unwrap();
        assert!(result["resistance_level"].as_f64().unwrap() >= 149.0);
        assert!(result["support_level"].as_f64().unwrap() <= 100.0);
    }

    #[tokio::test]
    async fn multi_timeframe_summarizes_trends() {
        let mock = Arc::new(MockBrokerage::default());
        *mock.bars.lock().unwrap() = sample_bars(100.0, 0.5, 60);
        let tool = AnalyzeMultiTimeframes::new(&ctx(mock));
        let result = tool.call(&args(json!({"symbol": "SPY"}))).await.unwrap();
        assert_eq!(result["summary"]["dominant_trend"], json!("bullish"));
        assert_eq!(result["analysis"].as_array().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn insufficient_bars_is_an_error() {
        let mock = Arc::new(MockBrokerage::default());
        *mock.bars.lock().unwrap() = sample_bars(100.0, 1.0, 3);
        let tool = CalculateRsi::new(&ctx(mock));
        let err = tool.call(&args(json!({"symbol": "SPY"}))).await.unwrap_err();
        assert!(err.to_string().contains("Insufficient price data"));
    }
}

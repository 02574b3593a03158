//! Typed wrappers over the auction backend endpoints

use serde::{Deserialize, Serialize};
use serde_json::Value;
use log::{debug, error};

use crate::client::ApiClient;
use crate::error::Error;
use crate::request::RequestDescriptor;

/// Franchise codes known to the backend
pub const TEAMS: [&str; 10] = [
  "CSK", "RCB", "MI", "KKR", "DC", "GT", "LSG", "PBKS", "RR", "SRH"
];

/// Player groups used by the recommendations endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlayerGroup
{   A
  , B
  , C
}

impl PlayerGroup
{   pub fn as_str(&self) -> &'static str
    {   match self
        {   PlayerGroup::A => "A"
          , PlayerGroup::B => "B"
          , PlayerGroup::C => "C"
        }
    }
}

impl std::str::FromStr for PlayerGroup
{   type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err>
    {   match s.trim().to_ascii_uppercase().as_str()
        {   "A" => Ok(PlayerGroup::A)
          , "B" => Ok(PlayerGroup::B)
          , "C" => Ok(PlayerGroup::C)
          , other => Err(Error::InvalidRequest(
              format!("unknown player group: {}", other)
            ))
        }
    }
}

/// Winning bid as sent to `POST /auction/sell`
///
/// The backend reads a bare number as crores and also accepts
/// unit-suffixed strings such as `"14.5Cr"` or `"1450L"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Price
{   /// Bare number, forwarded as-is
    Amount(u32)
  , /// Unit-suffixed string
    Quoted(String)
}

impl Price
{   pub fn crores(amount: f64) -> Self
    {   Price::Quoted(format!("{}Cr", amount))
    }

    pub fn lakhs(amount: u32) -> Self
    {   Price::Quoted(format!("{}L", amount))
    }

    /// Positive amount with an optional `Cr` or `L` suffix
    pub fn validate(&self) -> Result<(), Error>
    {   let valid = match self
        {   Price::Amount(amount) => *amount > 0
          , Price::Quoted(text) => {
              let upper = text.trim().to_ascii_uppercase();
              let number = upper
                .strip_suffix("CR")
                .or_else(|| upper.strip_suffix('L'))
                .unwrap_or(&upper)
                .trim();
              number.parse::<f64>().map(|n| n > 0.0).unwrap_or(false)
            }
        };
        if valid
        {   Ok(())
        } else
        {   Err(Error::InvalidRequest(
              format!("price must be positive: {}", self)
            ))
        }
    }
}

impl From<u32> for Price
{   fn from(amount: u32) -> Self
    {   Price::Amount(amount)
    }
}

impl std::fmt::Display for Price
{   fn fmt(&self, f: &mut std::fmt::Formatter<'_>)
      -> std::fmt::Result
    {   match self
        {   Price::Amount(amount) => write!(f, "{}", amount)
          , Price::Quoted(text) => write!(f, "{}", text.trim())
        }
    }
}

/// Body of `POST /auction/sell`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SellRequest
{   pub player_name: String
  , pub team: String
  , pub price: Price
}

/// Body of `POST /chat`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest
{   pub message: String
  , #[serde(skip_serializing_if = "Option::is_none")]
    pub team_name: Option<String>
  , #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<Value>
}

/// Chat answer, whichever field the backend filled
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatReply
{   pub text: String
  , pub source: Option<String>
}

impl ChatReply
{   /// Read `response`, falling back to `message`
    pub fn from_value(value: &Value) -> Result<Self, Error>
    {   let text = ["response", "message"]
          .iter()
          .find_map(|field| value.get(*field).and_then(Value::as_str))
          .ok_or_else(|| {
            error!("Chat reply without response text: {}", value);
            Error::Parse("chat reply has no response text".to_string())
          })?;
        let source = value.get("source")
          .and_then(Value::as_str)
          .map(str::to_string);
        Ok(ChatReply
        {   text: text.to_string()
          , source
        })
    }
}

/// Trimmed, upper-case team code; empty codes are rejected
pub fn normalize_team(team: &str) -> Result<String, Error>
{   let code = team.trim().to_ascii_uppercase();
    if code.is_empty()
    {   return Err(Error::InvalidRequest(
          "team must not be empty".to_string()
        ));
    }
    if !code.chars().all(|c| c.is_ascii_alphanumeric())
    {   return Err(Error::InvalidRequest(
          format!("invalid team code: {}", team)
        ));
    }
    Ok(code)
}

/// Auction backend API
#[derive(Debug, Clone)]
pub struct AuctionApi
{   client: ApiClient
}

impl AuctionApi
{   pub fn new(client: ApiClient) -> Self
    {   AuctionApi { client }
    }

    pub fn client(&self) -> &ApiClient
    {   &self.client
    }

    /// Overall auction state snapshot
    pub async fn get_state(&self) -> Result<Value, Error>
    {   self.client.request(RequestDescriptor::get("/state")).await
    }

    pub async fn team_matrix(&self, team: &str) -> Result<Value, Error>
    {   self.team_view(team, "matrix").await
    }

    pub async fn team_gaps(&self, team: &str) -> Result<Value, Error>
    {   self.team_view(team, "gaps").await
    }

    pub async fn team_weak_points(&self, team: &str)
      -> Result<Value, Error>
    {   self.team_view(team, "weak-points").await
    }

    pub async fn team_recommendations(
      &self
    , team: &str
    , group: Option<PlayerGroup>
    ) -> Result<Value, Error>
    {   let team = normalize_team(team)?;
        let path = match group
        {   Some(group) => format!(
              "/teams/{}/recommendations?group={}",
              team, group.as_str()
            )
          , None => format!("/teams/{}/recommendations", team)
        };
        self.client.request(RequestDescriptor::get(path)).await
    }

    /// Cross-team recommendation snapshot
    pub async fn live_recommendations(&self) -> Result<Value, Error>
    {   self.client
          .request(RequestDescriptor::get("/live/recommendations"))
          .await
    }

    /// Record a completed sale
    pub async fn sell_player(
      &self
    , player_name: &str
    , team: &str
    , price: impl Into<Price>
    ) -> Result<Value, Error>
    {   let price = price.into();
        let player_name = player_name.trim();
        if player_name.is_empty()
        {   return Err(Error::InvalidRequest(
              "player name must not be empty".to_string()
            ));
        }
        price.validate()?;
        let body = SellRequest
        {   player_name: player_name.to_string()
          , team: normalize_team(team)?
          , price
        };
        debug!(
          "Selling {} to {} for {}",
          body.player_name, body.team, body.price
        );
        let descriptor = RequestDescriptor::post("/auction/sell")
          .json(&body)?;
        self.client.request(descriptor).await
    }

    /// Ask the strategist a question
    pub async fn chat(
      &self
    , message: &str
    , team_name: Option<&str>
    , context: Option<Value>
    ) -> Result<ChatReply, Error>
    {   if message.trim().is_empty()
        {   return Err(Error::InvalidRequest(
              "message must not be empty".to_string()
            ));
        }
        let team_name = match team_name
        {   Some(team) => Some(normalize_team(team)?)
          , None => None
        };
        let body = ChatRequest
        {   message: message.to_string()
          , team_name
          , context
        };
        let descriptor = RequestDescriptor::post("/chat").json(&body)?;
        let value = self.client.request(descriptor).await?;
        ChatReply::from_value(&value)
    }

    pub async fn health_check(&self) -> bool
    {   self.client.health_check().await
    }

    async fn team_view(
      &self
    , team: &str
    , view: &str
    ) -> Result<Value, Error>
    {   let team = normalize_team(team)?;
        self.client
          .request(RequestDescriptor::get(
            format!("/teams/{}/{}", team, view)
          ))
          .await
    }
}

/// Test fixtures: representative JSON payloads from ANA HidroWebService.
///
/// Token endpoint shape:
///   { status, code, message, items: { tokenautenticacao, validade } }
///
/// Series endpoint shape (HidroinfoanaSerieTelemetricaDetalhada):
///   { status, code, message, items: [ {
///       codigoestacao, Cota_Adotada, Cota_Adotada_Status,
///       Data_Hora_Medicao, Data_Atualizacao, Vazao_Adotada, ... } ] }
///
/// Note: `Cota_Adotada` is a decimal STRING in centimeters and may be null
/// when the sensor did not report. Items are not guaranteed to be sorted.

#[cfg(test)]
pub(crate) fn fixture_token_json() -> &'static str {
    r#"{
      "status": "OK",
      "code": 200,
      "message": "Sucesso",
      "items": {
        "tokenautenticacao": "eyJhbGciOiJIUzI1NiJ9.test-token",
        "validade": "2024-06-01 11:00:00"
      }
    }"#
}

/// Rejected credentials: the provider answers 401 with no token.
#[cfg(test)]
pub(crate) fn fixture_token_rejected_json() -> &'static str {
    r#"{
      "status": "UNAUTHORIZED",
      "code": 401,
      "message": "Identificador ou senha inválidos",
      "items": null
    }"#
}

/// Cais Mauá C6 (87450004): three 15-minute readings delivered out of order.
/// The newest (10:30) reads 318.0 cm.
#[cfg(test)]
pub(crate) fn fixture_series_json() -> &'static str {
    r#"{
      "status": "OK",
      "code": 200,
      "message": "Sucesso",
      "items": [
        {
          "codigoestacao": "87450004",
          "Cota_Adotada": "315.00",
          "Cota_Adotada_Status": "0",
          "Data_Hora_Medicao": "2024-06-01 10:00:00.0",
          "Data_Atualizacao": "2024-06-01 10:05:12.0"
        },
        {
          "codigoestacao": "87450004",
          "Cota_Adotada": "318.00",
          "Cota_Adotada_Status": "0",
          "Data_Hora_Medicao": "2024-06-01 10:30:00.0",
          "Data_Atualizacao": "2024-06-01 10:35:40.0"
        },
        {
          "codigoestacao": "87450004",
          "Cota_Adotada": "316.50",
          "Cota_Adotada_Status": "0",
          "Data_Hora_Medicao": "2024-06-01 10:15:00.0",
          "Data_Atualizacao": "2024-06-01 10:20:03.0"
        }
      ]
    }"#
}

/// Station online but nothing measured yet today.
#[cfg(test)]
pub(crate) fn fixture_empty_series_json() -> &'static str {
    r#"{ "status": "OK", "code": 200, "message": "Sucesso", "items": [] }"#
}

/// Some deployments of the service return the gauge as a bare number and
/// null for a missing sensor value.
#[cfg(test)]
pub(crate) fn fixture_mixed_value_types_json() -> &'static str {
    r#"{
      "items": [
        { "Cota_Adotada": 312, "Data_Hora_Medicao": "2024-06-01 09:45:00" },
        { "Cota_Adotada": null, "Data_Hora_Medicao": "2024-06-01 10:00:00" }
      ]
    }"#
}

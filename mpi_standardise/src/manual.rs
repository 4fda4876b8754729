/*!

This is the long-form manual for `mpi_standardise` and the `ophi` program.

## Source tables

The Oxford Poverty and Human Development Initiative (OPHI) publishes the Global
Multidimensional Poverty Index (MPI) as three Excel workbooks:

* the national table: one row per country and survey
* the subnational table: one row per region of a country and survey
* the trends over time table: one row per country (national sheet) or region
  (subnational sheet), with the values measured at two timepoints `t0` and `t1`
  side by side.

The headers of these workbooks span several rows and change from one release
to the next. The columns to read are therefore never guessed: each table lists
one or more _revisions_ in the configuration, and the first revision whose
columns are all present in the sheet is used.

## Standardised rows

Every source row becomes a row with the following fields:

| field                      | content                                              |
|----------------------------|------------------------------------------------------|
| `country_code`             | ISO 3166-1 alpha-3 code                              |
| `admin1_code`              | pcode of the region, empty for national rows         |
| `admin1_name`              | name of the region as written in the table           |
| `mpi`                      | MPI, range 0 to 1                                    |
| `headcount_ratio`          | % of the population that is multidimensionally poor  |
| `intensity_of_deprivation` | average % of weighted deprivations of the poor       |
| `vulnerable_to_poverty`    | % of the population vulnerable to poverty            |
| `in_severe_poverty`        | % of the population in severe poverty                |
| `reference_period_start`   | first instant of the survey period                   |
| `reference_period_end`     | last instant of the survey period                    |
| `survey`                   | name of the survey (optional)                        |
| `methodology_note`         | note attached to the row (optional)                  |

Indicator values are written with 4 decimal places. A cell that is empty or
does not hold a number (the tables use `..` for missing values) gives an empty
value.

Rows without a country code are skipped: these are the blank rows and the
footnotes at the end of the sheets.

## Survey periods

The year column holds a year (`2020`) or a range (`2015-2016`, `2015-16`).
Each side of a range may also be a month (`10/2015`, `Oct 2015`) or a day
(`15/10/2015`). A range starts at the first day of its first part and ends on
the last day of its last part. For the subnational and trend tables the end is
the last second of that day (`23:59:59`), for the national table it is
midnight.

A year column that cannot be read stops the run: the error names the text
that was found.

## Keys and duplicates

A row is identified by its country code, region code, region name and survey
period. National and subnational rows go into the same table, so a national
row is the row with an empty region. When two rows of a table share the same
key, the first one is kept and the second one is reported in the log:

```text
[ERROR mpi_standardise] Key (AFG, AF01, Kabul, 2015-01-01T00:00:00, 2016-12-31T23:59:59) already exists in subnational!
```

The two timepoints of the trend tables are read into separate tables, so a
country measured twice with the same survey period is not reported as a
duplicate. They are merged afterwards: for rows that share a key, the values of
`t1` replace the values of `t0` where `t1` has one. Rows present at a single
timepoint are kept unchanged.

## Date ranges

For every country, and for the whole dataset under the name `global`, the
program keeps the earliest start and the latest end of all the rows it has
read. These ranges become the time period of the published datasets.

## Configuration

The program reads a JSON file (by default `config/project_configuration.json`).
Paths in this file are relative to the file itself. The main sections are:

* `mpiNational`, `mpiSubnational`: a `source` (`url` as a local path or an
  `http(s)` address, optional `filename`, `format` of `xlsx` or `csv`), the
  `sheet`, the 1-based `headerRows` joined into the column names, `maxEndtime`,
  and the list of `revisions`.
* `trends`: a `source`, the `timepoints` labels (`early`, `late`), and a table
  for the `national` and `subnational` sheets. Column names of trend revisions
  contain `{timepoint}`, which is replaced by each label in turn.
* `admin1`: the `source` of the admin-1 lookup table (CSV with the columns
  `Location`, `Admin Level`, `P-Code` and `Name`) and `nameMappings`, which
  map `"ISO3|Region name"` to a pcode when the names differ.
* `hxltags`: the output columns, in order, with the HXL hashtag written in the
  second row of each CSV file and the standardised `field` they hold.
* `dataset`: tags, notes, methodology and resource descriptions of the
  published datasets.

A revision lists `countryColumn`, optional `countryNameColumn` and
`regionColumn`, `dateColumn`, five `indicatorColumns` (in the order of the
table above), and optional `surveyColumn` and `methodologyNoteColumn`.

## Output

The output folder receives, for the global scope and for every country:

* `<scope>_mpi.csv`: the national and subnational rows
* `<scope>_mpi_trends.csv`: the merged trend rows, when there are any
* `<scope>_dataset.json`: the dataset record, with its resources and time period

The scope is `global` or the ISO3 code of the country. Rows are sorted by key.
A scope without any row produces no file.

When the configuration has a `hapiDataset` section, the global rows are also
written as a poverty rate table (`hdx_hapi_poverty_rate_global.csv` with the
bundled configuration). Each row gets the region name as published, the name
of its unit in the admin-1 lookup table and an admin level: 0 for a national
row, 1 for a region.

 */
